//! DevHelper - self-service dev domains and timed VPN access
//!
//! Runs the command API, the reminder/reclaim scheduler and keeps the reverse
//! proxy configuration in sync with the database.

mod config;
mod slack;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use devhelper_api::{ApiServer, ApiServerConfig, Dispatcher};
use devhelper_core::{
    DomainManager, DomainSettings, FlagCache, Job, Notifier, Scheduler, SchedulerSettings,
    VpnManager, VpnSettings,
};
use devhelper_db::{DbFlagCache, SeaDomainRepository, SeaVpnRepository};
use devhelper_pritunl::{PritunlClient, PritunlConfig};
use devhelper_proxy::{FileReconciler, ReconcilerConfig};
use sea_orm::DatabaseConnection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// DevHelper - dev domains and VPN sessions on demand
#[derive(Parser, Debug)]
#[command(name = "devhelper")]
#[command(about = "DevHelper - dev domains and VPN sessions on demand")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, short, env = "DEVHELPER_CONFIG", default_value = config::DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    /// Database URL, overrides app.database_url
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Skip proxy reloads and run domain sweeps every minute
    #[arg(long, env = "DEVHELPER_DEBUG", global = true)]
    debug: bool,

    /// Log level (trace, debug, info, warn, error), overrides app.log_level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run migrations, the command API and the scheduler (default)
    Run,
    /// Run database migrations and exit
    Migrate,
    /// Check an address against the configured network policy
    CheckIp {
        /// Candidate address
        ip: String,
    },
    /// Run every reminder and reclaim job once and exit
    Sweep,
    /// Print an example configuration file
    ExampleConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Run);
    if let Commands::ExampleConfig = command {
        print!("{}", Config::template());
        return Ok(());
    }

    let mut config = Config::load(&cli.config)?;
    if let Some(url) = cli.database_url {
        config.app.database_url = url;
    }
    if cli.debug {
        config.app.debug = true;
    }
    let log_level = cli.log_level.unwrap_or_else(|| config.app.log_level.clone());
    init_logging(&log_level)?;

    match command {
        Commands::CheckIp { ip } => {
            let policy = config.network_policy()?;
            match policy.check(&ip) {
                Ok(addr) => println!("✅ {} is allowed", addr),
                Err(e) => {
                    println!("❌ {}", e);
                    std::process::exit(1);
                }
            }
            Ok(())
        }
        Commands::Migrate => {
            open_database(&config).await?;
            Ok(())
        }
        Commands::Sweep => {
            let app = App::build(&config).await?;
            let scheduler = app.scheduler(&config)?;
            let mut failed = false;
            for job in [
                Job::DomainReminder,
                Job::DomainReclaim,
                Job::VpnReminder,
                Job::VpnReclaim,
            ] {
                match scheduler.run(job).await {
                    Ok(count) => info!(job = job.name(), count, "Sweep finished"),
                    Err(e) => {
                        error!(job = job.name(), error = %e, "Sweep failed");
                        failed = true;
                    }
                }
            }
            if failed {
                anyhow::bail!("one or more sweeps failed");
            }
            Ok(())
        }
        Commands::Run => run(&cli.config, config).await,
        Commands::ExampleConfig => Ok(()),
    }
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .context("Failed to initialize logging filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
    Ok(())
}

async fn open_database(config: &Config) -> Result<DatabaseConnection> {
    let db = devhelper_db::connect(&config.app.database_url)
        .await
        .context("Failed to connect to database")?;
    devhelper_db::migrate(&db)
        .await
        .context("Failed to run database migrations")?;
    Ok(db)
}

fn domain_settings(config: &Config) -> Result<DomainSettings> {
    let mut settings = DomainSettings::new(
        config.webserver.parent_domain.clone(),
        config.network_policy()?,
    )
    .with_utc_offset(config.utc_offset()?)
    .with_notify_hour(config.webserver.notify_hour)
    .with_retention(chrono::Duration::days(config.webserver.retention_days));
    settings.warning_window = chrono::Duration::hours(config.scheduler.domain_warning_hours);
    Ok(settings)
}

/// Wired services shared by the run and sweep commands
struct App {
    domains: Arc<DomainManager>,
    vpn: Option<Arc<VpnManager>>,
    notifier: Arc<dyn Notifier>,
    flags: Arc<dyn FlagCache>,
}

impl App {
    async fn build(config: &Config) -> Result<Self> {
        let db = open_database(config).await?;

        let mut proxy = ReconcilerConfig::new(config.server_kind()?, &config.webserver.config_dir);
        proxy.template_path = config.webserver.template_path.clone();
        proxy.caddyfile = config.webserver.caddyfile.clone();
        proxy.debug = config.app.debug;
        proxy.reload_timeout = Duration::from_secs(config.webserver.reload_timeout_seconds);
        let reconciler = FileReconciler::new(proxy)
            .await
            .context("Failed to initialize proxy reconciler")?;

        let domains = DomainManager::new(
            domain_settings(config)?,
            Arc::new(SeaDomainRepository::new(db.clone())),
            Arc::new(reconciler),
        )
        .with_operation_timeout(config.operation_timeout());

        let vpn = match &config.pritunl {
            Some(section) => {
                let client = PritunlClient::new(PritunlConfig {
                    host: section.host.clone(),
                    token: section.token.clone(),
                    secret: section.secret.clone(),
                    organization: section.organization.clone(),
                    request_timeout: Duration::from_secs(section.request_timeout_seconds),
                })
                .context("Failed to initialize Pritunl client")?;
                let settings = VpnSettings {
                    allowed_hours: section.allowed_hours.clone(),
                    warning_window: chrono::Duration::minutes(
                        config.scheduler.vpn_warning_minutes,
                    ),
                };
                let manager = VpnManager::new(
                    settings,
                    Arc::new(client),
                    Arc::new(SeaVpnRepository::new(db.clone())),
                )
                .with_operation_timeout(config.operation_timeout());
                Some(Arc::new(manager))
            }
            None => {
                info!("No pritunl section, VPN commands are disabled");
                None
            }
        };

        let notifier: Arc<dyn Notifier> = if config.slack.bot_token.is_empty() {
            warn!("No Slack bot token configured, notices are only logged");
            Arc::new(slack::LogNotifier)
        } else {
            Arc::new(
                slack::SlackNotifier::new(&config.slack.api_url, config.slack.bot_token.clone())
                    .context("Failed to initialize Slack notifier")?,
            )
        };

        Ok(Self {
            domains: Arc::new(domains),
            vpn,
            notifier,
            flags: Arc::new(DbFlagCache::new(db)),
        })
    }

    fn scheduler(&self, config: &Config) -> Result<Arc<Scheduler>> {
        let settings = SchedulerSettings {
            channel: config.slack.channel.clone(),
            admin_ids: config.app.admin_ids.clone(),
            domain_interval: Duration::from_secs(config.scheduler.domain_interval_hours * 3600),
            vpn_interval: Duration::from_secs(config.scheduler.vpn_interval_seconds),
            notify_hour: config.webserver.notify_hour,
            utc_offset: config.utc_offset()?,
            debug: config.app.debug,
        };
        Ok(Arc::new(Scheduler::new(
            settings,
            self.domains.clone(),
            self.vpn.clone(),
            self.notifier.clone(),
            self.flags.clone(),
        )))
    }
}

async fn run(config_path: &Path, config: Config) -> Result<()> {
    info!("🚀 Starting devhelper");
    info!("Parent domain: {}", config.webserver.parent_domain);
    info!("Webserver: {}", config.webserver.kind);
    if config.app.debug {
        warn!("Debug mode: proxy reloads are skipped");
    }

    let app = App::build(&config).await?;
    let shutdown = CancellationToken::new();

    let mut handles = app.scheduler(&config)?.start(shutdown.clone());

    if config.api.enabled {
        let dispatcher = Arc::new(Dispatcher::new(
            app.domains.clone(),
            app.vpn.clone(),
            app.notifier.clone(),
            config.app.admin_ids.clone(),
        ));
        let server = ApiServer::new(
            ApiServerConfig {
                bind_addr: config.api.bind_addr,
                request_timeout: Duration::from_secs(config.api.request_timeout_seconds),
                token: config.api.token.clone().filter(|t| !t.is_empty()),
            },
            dispatcher,
            app.vpn.is_some(),
        );
        let token = shutdown.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = server.start(token.clone()).await {
                error!("API server error: {:#}", e);
                token.cancel();
            }
        }));
    } else {
        info!("Command API disabled");
    }

    spawn_settings_reload(config_path.to_path_buf(), app.domains.clone(), shutdown.clone());

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C, shutting down...");
        }
        _ = shutdown.cancelled() => {
            warn!("A service stopped, shutting down...");
        }
    }
    shutdown.cancel();

    for handle in handles {
        if let Err(e) = handle.await {
            error!("Task failed during shutdown: {}", e);
        }
    }

    info!("✅ Shutdown complete");
    Ok(())
}

/// Re-read domain settings from the config file on SIGHUP
#[cfg(unix)]
fn spawn_settings_reload(path: PathBuf, domains: Arc<DomainManager>, shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Cannot listen for SIGHUP, settings reload disabled: {}", e);
            return;
        }
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    match Config::load(&path).and_then(|c| domain_settings(&c)) {
                        Ok(settings) => {
                            domains.reload_settings(settings);
                            info!(path = %path.display(), "Reloaded domain settings");
                        }
                        Err(e) => error!("Keeping previous settings, reload failed: {:#}", e),
                    }
                }
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_settings_reload(_path: PathBuf, _domains: Arc<DomainManager>, _shutdown: CancellationToken) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_run() {
        let cli = Cli::try_parse_from(["devhelper"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from(config::DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_cli_subcommands() {
        let cli = Cli::try_parse_from(["devhelper", "check-ip", "10.1.2.5"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::CheckIp { ref ip }) if ip == "10.1.2.5"));

        let cli =
            Cli::try_parse_from(["devhelper", "--config", "/tmp/x.yml", "sweep", "--debug"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Sweep)));
        assert!(cli.debug);
        assert_eq!(cli.config, PathBuf::from("/tmp/x.yml"));
    }

    #[test]
    fn test_domain_settings_from_config() {
        let config = Config::parse(
            "app: {timezone: '+02:00'}\nwebserver: {parent_domain: dev.example, retention_days: 7, notify_hour: 10, allowed_subnets: [10.1.2.0/24]}\nscheduler: {domain_warning_hours: 12}",
        )
        .unwrap();
        let settings = domain_settings(&config).unwrap();
        assert_eq!(settings.parent_domain, "dev.example");
        assert_eq!(settings.retention, chrono::Duration::days(7));
        assert_eq!(settings.notify_hour, 10);
        assert_eq!(settings.utc_offset.local_minus_utc(), 7200);
        assert_eq!(settings.warning_window, chrono::Duration::hours(12));
        assert!(settings.policy.check("10.1.2.5").is_ok());
    }

    #[tokio::test]
    async fn test_app_builds_against_memory_database() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "app: {{database_url: 'sqlite::memory:', debug: true}}\nwebserver: {{parent_domain: dev.example, config_dir: '{}', allowed_subnets: [10.1.2.0/24]}}",
            dir.path().join("sites").display()
        );
        let config = Config::parse(&yaml).unwrap();

        let app = App::build(&config).await.unwrap();
        assert!(app.vpn.is_none());
        assert!(dir.path().join("sites").is_dir());

        let scheduler = app.scheduler(&config).unwrap();
        assert_eq!(scheduler.run(Job::DomainReclaim).await.unwrap(), 0);

        let domain = app.domains.create("U1", "Ann Lee", "10.1.2.5").await.unwrap();
        assert_eq!(domain.fqdn, "a-lee.dev.example");
        assert!(dir.path().join("sites").join("a-lee.dev.example").exists());
    }
}
