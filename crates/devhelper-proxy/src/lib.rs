//! Reverse-proxy configuration reconciler
//!
//! Keeps one virtual-host file per domain in a configuration directory that
//! nginx or caddy includes, and reloads the daemon after every change.
//!
//! File names are the domain's fqdn, validated as a DNS name before any path
//! is built, so a crafted name can never escape the directory.

pub mod template;

use async_trait::async_trait;
use devhelper_core::{Domain, ProxyReconciler, ReconcileError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const DEFAULT_CADDYFILE: &str = "/etc/caddy/Caddyfile";
pub const DEFAULT_RELOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Reverse proxy daemon flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    #[default]
    Nginx,
    Caddy,
}

impl ServerKind {
    pub fn builtin_template(&self) -> &'static str {
        match self {
            ServerKind::Nginx => template::NGINX_TEMPLATE,
            ServerKind::Caddy => template::CADDY_TEMPLATE,
        }
    }

    /// Config test and reload commands, in execution order
    fn reload_commands(&self, caddyfile: &Path) -> Vec<(String, Vec<String>)> {
        match self {
            ServerKind::Nginx => vec![
                ("nginx".to_string(), vec!["-t".to_string()]),
                (
                    "nginx".to_string(),
                    vec!["-s".to_string(), "reload".to_string()],
                ),
            ],
            ServerKind::Caddy => {
                let config = caddyfile.display().to_string();
                vec![
                    (
                        "caddy".to_string(),
                        vec!["validate".to_string(), "--config".to_string(), config.clone()],
                    ),
                    (
                        "caddy".to_string(),
                        vec!["reload".to_string(), "--config".to_string(), config],
                    ),
                ]
            }
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerKind::Nginx => f.write_str("nginx"),
            ServerKind::Caddy => f.write_str("caddy"),
        }
    }
}

impl FromStr for ServerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nginx" => Ok(ServerKind::Nginx),
            "caddy" => Ok(ServerKind::Caddy),
            other => Err(format!("unknown webserver '{}', expected nginx or caddy", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub kind: ServerKind,
    pub config_dir: PathBuf,
    /// Template file; the built-in template of `kind` is used when unset
    pub template_path: Option<PathBuf>,
    pub caddyfile: PathBuf,
    /// Skip daemon reloads
    pub debug: bool,
    /// Bound on each reload command
    pub reload_timeout: Duration,
}

impl ReconcilerConfig {
    pub fn new(kind: ServerKind, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            config_dir: config_dir.into(),
            template_path: None,
            caddyfile: PathBuf::from(DEFAULT_CADDYFILE),
            debug: false,
            reload_timeout: DEFAULT_RELOAD_TIMEOUT,
        }
    }
}

/// File-per-domain reconciler for nginx and caddy
pub struct FileReconciler {
    config: ReconcilerConfig,
    template: String,
}

impl FileReconciler {
    /// Create the config directory if needed and load the template
    pub async fn new(config: ReconcilerConfig) -> Result<Self, ReconcileError> {
        fs::create_dir_all(&config.config_dir).await?;

        let template = match &config.template_path {
            Some(path) => fs::read_to_string(path).await.map_err(|e| {
                ReconcileError::Template(format!("cannot read {}: {}", path.display(), e))
            })?,
            None => config.kind.builtin_template().to_string(),
        };
        template::validate(&template)?;

        info!(
            kind = %config.kind,
            dir = %config.config_dir.display(),
            debug = config.debug,
            "Proxy reconciler ready"
        );
        Ok(Self { config, template })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config.config_dir
    }

    /// Path of the config file for `fqdn`
    pub fn path_for(&self, fqdn: &str) -> Result<PathBuf, ReconcileError> {
        validate_name(fqdn)?;
        Ok(self.config.config_dir.join(fqdn))
    }

    pub fn render(&self, domain: &Domain) -> Result<String, ReconcileError> {
        template::render(&self.template, domain)
    }

    async fn write_atomically(&self, path: &Path, contents: &[u8]) -> Result<(), ReconcileError> {
        let tmp = self
            .config
            .config_dir
            .join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        if let Err(err) = fs::write(&tmp, contents).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn reload(&self) -> Result<(), ReconcileError> {
        if self.config.debug {
            debug!(kind = %self.config.kind, "Debug mode, skipping reload");
            return Ok(());
        }

        for (program, args) in self.config.kind.reload_commands(&self.config.caddyfile) {
            let command = format!("{} {}", program, args.join(" "));
            let output = tokio::time::timeout(
                self.config.reload_timeout,
                Command::new(&program).args(&args).kill_on_drop(true).output(),
            )
            .await
            .map_err(|_| ReconcileError::Reload {
                command: command.clone(),
                stderr: format!("timed out after {:?}", self.config.reload_timeout),
            })?
            .map_err(|e| ReconcileError::Reload {
                command: command.clone(),
                stderr: e.to_string(),
            })?;

            if !output.status.success() {
                return Err(ReconcileError::Reload {
                    command,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }
        debug!(kind = %self.config.kind, "Reloaded proxy");
        Ok(())
    }
}

#[async_trait]
impl ProxyReconciler for FileReconciler {
    async fn create(&self, domain: &Domain) -> Result<(), ReconcileError> {
        let path = self.path_for(&domain.fqdn)?;
        if fs::try_exists(&path).await? {
            return Err(ReconcileError::ConfigAlreadyExists(domain.fqdn.clone()));
        }

        let rendered = self.render(domain)?;
        self.write_atomically(&path, rendered.as_bytes()).await?;
        self.reload().await?;

        info!(kind = %self.config.kind, fqdn = %domain.fqdn, ip = %domain.ip, "Created config");
        Ok(())
    }

    async fn delete(&self, fqdn: &str) -> Result<(), ReconcileError> {
        let path = self.path_for(fqdn)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReconcileError::ConfigMissing(fqdn.to_string()))
            }
            Err(err) => return Err(err.into()),
        }
        self.reload().await?;

        info!(kind = %self.config.kind, fqdn = %fqdn, "Deleted config");
        Ok(())
    }

    async fn replace(&self, previous: &Domain, next: &Domain) -> Result<(), ReconcileError> {
        let old_path = self.path_for(&previous.fqdn)?;
        let new_path = self.path_for(&next.fqdn)?;
        let renamed = old_path != new_path;

        let prior = match fs::read(&old_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReconcileError::ConfigMissing(previous.fqdn.clone()))
            }
            Err(err) => return Err(err.into()),
        };
        if renamed && fs::try_exists(&new_path).await? {
            return Err(ReconcileError::ConfigAlreadyExists(next.fqdn.clone()));
        }

        let rendered = self.render(next)?;
        self.write_atomically(&new_path, rendered.as_bytes()).await?;
        if renamed {
            fs::remove_file(&old_path).await?;
        }

        if let Err(err) = self.reload().await {
            warn!(fqdn = %next.fqdn, error = %err, "Reload failed, restoring previous config");
            if renamed {
                let _ = fs::remove_file(&new_path).await;
            }
            self.write_atomically(&old_path, &prior).await?;
            return Err(err);
        }

        info!(kind = %self.config.kind, fqdn = %next.fqdn, ip = %next.ip, "Replaced config");
        Ok(())
    }

    async fn exists(&self, fqdn: &str) -> Result<bool, ReconcileError> {
        let path = self.path_for(fqdn)?;
        Ok(fs::try_exists(&path).await?)
    }
}

/// Accept only DNS names: labels of alphanumerics and hyphens joined by dots
pub fn validate_name(fqdn: &str) -> Result<(), ReconcileError> {
    let invalid = || ReconcileError::InvalidName(fqdn.to_string());

    if fqdn.is_empty() || fqdn.len() > 253 {
        return Err(invalid());
    }
    for label in fqdn.split('.') {
        if label.is_empty()
            || label.len() > 63
            || label.starts_with('-')
            || label.ends_with('-')
            || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(invalid());
        }
    }
    Ok(())
}
