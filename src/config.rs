//! YAML configuration file
//!
//! Secrets may reference environment variables with `${VAR}`; they are
//! expanded after parsing.

use anyhow::{bail, Context, Result};
use chrono::FixedOffset;
use devhelper_policy::NetworkPolicy;
use devhelper_proxy::ServerKind;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub webserver: WebserverConfig,
    /// VPN features are disabled when the section is missing
    pub pritunl: Option<PritunlSection>,
    pub slack: SlackConfig,
    pub scheduler: SchedulerConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    /// Skip proxy reloads and run domain sweeps every minute
    pub debug: bool,
    /// UTC offset used for deadlines and notices, e.g. "+02:00"
    pub timezone: String,
    pub database_url: String,
    /// Chat user ids allowed to run privileged commands
    pub admin_ids: Vec<String>,
    pub operation_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug: false,
            timezone: "+00:00".to_string(),
            database_url: "sqlite://./devhelper.db?mode=rwc".to_string(),
            admin_ids: Vec::new(),
            operation_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebserverConfig {
    pub kind: String,
    pub parent_domain: String,
    /// Directory holding one virtual-host file per domain
    pub config_dir: PathBuf,
    pub template_path: Option<PathBuf>,
    pub caddyfile: PathBuf,
    pub allowed_subnets: Vec<String>,
    pub denied_ips: Vec<String>,
    pub retention_days: i64,
    pub notify_hour: u32,
    pub reload_timeout_seconds: u64,
}

impl Default for WebserverConfig {
    fn default() -> Self {
        Self {
            kind: "nginx".to_string(),
            parent_domain: String::new(),
            config_dir: PathBuf::from("/etc/nginx/sites-enabled"),
            template_path: None,
            caddyfile: PathBuf::from(devhelper_proxy::DEFAULT_CADDYFILE),
            allowed_subnets: Vec::new(),
            denied_ips: Vec::new(),
            retention_days: devhelper_core::domain::DEFAULT_RETENTION_DAYS,
            notify_hour: devhelper_core::domain::DEFAULT_NOTIFY_HOUR,
            reload_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PritunlSection {
    pub host: String,
    pub token: String,
    pub secret: String,
    pub organization: String,
    /// Durations a timed session may be requested for
    pub allowed_hours: Vec<u32>,
    pub request_timeout_seconds: u64,
}

impl Default for PritunlSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: String::new(),
            secret: String::new(),
            organization: String::new(),
            allowed_hours: devhelper_core::vpn::DEFAULT_SESSION_HOURS.to_vec(),
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Bot token; notices are only logged when empty
    pub bot_token: String,
    pub channel: String,
    pub api_url: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            channel: "general".to_string(),
            api_url: crate::slack::DEFAULT_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub domain_interval_hours: u64,
    pub vpn_interval_seconds: u64,
    /// How long before deletion a domain owner is reminded
    pub domain_warning_hours: i64,
    pub vpn_warning_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            domain_interval_hours: 24,
            vpn_interval_seconds: 60,
            domain_warning_hours: 24,
            vpn_warning_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_addr: SocketAddr,
    pub request_timeout_seconds: u64,
    /// Bearer token expected from the chat gateway
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            request_timeout_seconds: 30,
            token: None,
        }
    }
}

impl Config {
    /// Load config from a specific file path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content)
    }

    /// Parse config from YAML string
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Config =
            serde_yaml::from_str(content).context("Failed to parse YAML config")?;

        config.expand_secrets();
        config.validate()?;
        Ok(config)
    }

    fn expand_secrets(&mut self) {
        self.slack.bot_token = expand_env_vars(&self.slack.bot_token);
        if let Some(pritunl) = self.pritunl.as_mut() {
            pritunl.token = expand_env_vars(&pritunl.token);
            pritunl.secret = expand_env_vars(&pritunl.secret);
        }
        if let Some(token) = self.api.token.as_mut() {
            *token = expand_env_vars(token);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let level = self.app.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            bail!(
                "Invalid log level '{}': must be one of {}",
                self.app.log_level,
                LOG_LEVELS.join(", ")
            );
        }

        self.server_kind()?;
        self.utc_offset()?;
        self.network_policy()?;

        if self.webserver.parent_domain.trim().is_empty() {
            bail!("webserver.parent_domain is required");
        }
        if self.webserver.retention_days <= 0 {
            bail!("webserver.retention_days must be positive");
        }
        if self.webserver.notify_hour > 23 {
            bail!(
                "webserver.notify_hour must be in 0-23, got {}",
                self.webserver.notify_hour
            );
        }
        if self.scheduler.domain_interval_hours == 0 || self.scheduler.vpn_interval_seconds == 0 {
            bail!("scheduler intervals must be positive");
        }
        if self.app.operation_timeout_seconds == 0 {
            bail!("app.operation_timeout_seconds must be positive");
        }

        if let Some(pritunl) = &self.pritunl {
            if pritunl.host.is_empty() || pritunl.organization.is_empty() {
                bail!("pritunl.host and pritunl.organization are required when pritunl is configured");
            }
            if pritunl.allowed_hours.is_empty() || pritunl.allowed_hours.contains(&0) {
                bail!("pritunl.allowed_hours must list positive durations");
            }
        }

        Ok(())
    }

    pub fn server_kind(&self) -> Result<ServerKind> {
        self.webserver
            .kind
            .parse::<ServerKind>()
            .map_err(|e| anyhow::anyhow!(e))
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.app.timezone)
    }

    pub fn network_policy(&self) -> Result<NetworkPolicy> {
        NetworkPolicy::from_config(&self.webserver.allowed_subnets, &self.webserver.denied_ips)
            .context("Invalid webserver network policy")
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.app.operation_timeout_seconds)
    }

    /// Example configuration
    pub fn template() -> String {
        r#"app:
  log_level: info
  debug: false
  timezone: "+02:00"
  database_url: "sqlite://./devhelper.db?mode=rwc"
  admin_ids: []

webserver:
  kind: nginx
  parent_domain: dev.example.com
  config_dir: /etc/nginx/sites-enabled
  allowed_subnets:
    - 10.0.0.0/16
  denied_ips: []

slack:
  bot_token: "${SLACK_BOT_TOKEN}"
  channel: general

api:
  bind_addr: 127.0.0.1:8080
  token: "${DEVHELPER_API_TOKEN}"
"#
        .to_string()
    }
}

/// Parse "+02:00", "-0530", "UTC" or "Z"
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("utc") || raw == "Z" {
        return FixedOffset::east_opt(0).context("zero offset");
    }

    let (sign, rest) = match raw.as_bytes()[0] {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => bail!("Invalid timezone offset '{}': expected e.g. +02:00", raw),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        bail!("Invalid timezone offset '{}': expected e.g. +02:00", raw);
    }
    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = digits[2..].parse()?;
    if hours > 14 || minutes > 59 {
        bail!("Invalid timezone offset '{}'", raw);
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .with_context(|| format!("Invalid timezone offset '{}'", raw))
}

/// Expand environment variables in a string
///
/// Supports `${VAR}` syntax. If the variable is not set, returns empty string.
pub fn expand_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}").expect("static pattern");

    for cap in re.captures_iter(input) {
        let var_value = std::env::var(&cap[1]).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
