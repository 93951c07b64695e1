//! Domain lifecycle manager
//!
//! Owns every mutation of [`Domain`] records and keeps them consistent with
//! the proxy configuration directory. All mutations of one fqdn run under a
//! per-fqdn lock, and every external call is bounded by the operation timeout.

use crate::error::{BatchFailure, LifecycleError, ReconcileError, RepositoryError, Result};
use crate::expiry::{classify, retention_deadline, Clock, ExpiryState, SystemClock};
use crate::locks::KeyedLocks;
use crate::model::{Domain, DEFAULT_HTTP_PORT};
use crate::naming::subdomain;
use crate::reconciler::ProxyReconciler;
use crate::repository::DomainRepository;
use crate::timeout::bounded;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use devhelper_policy::NetworkPolicy;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_RETENTION_DAYS: i64 = 14;
pub const DEFAULT_NOTIFY_HOUR: u32 = 9;
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration snapshot used by one domain operation
#[derive(Debug, Clone)]
pub struct DomainSettings {
    pub parent_domain: String,
    pub policy: NetworkPolicy,
    pub retention: chrono::Duration,
    /// Hour of day (in `utc_offset`) that deadlines are moved to
    pub notify_hour: u32,
    pub utc_offset: FixedOffset,
    /// How long before `delete_at` a domain counts as expiring soon
    pub warning_window: chrono::Duration,
}

impl DomainSettings {
    pub fn new(parent_domain: impl Into<String>, policy: NetworkPolicy) -> Self {
        Self {
            parent_domain: parent_domain.into(),
            policy,
            retention: chrono::Duration::days(DEFAULT_RETENTION_DAYS),
            notify_hour: DEFAULT_NOTIFY_HOUR,
            utc_offset: Utc.fix(),
            warning_window: chrono::Duration::days(1),
        }
    }

    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn with_notify_hour(mut self, hour: u32) -> Self {
        self.notify_hour = hour;
        self
    }

    pub fn with_retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = retention;
        self
    }
}

/// Parameter accepted by [`DomainManager::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainField {
    /// Renew `delete_at`
    Expire,
    Ip,
    BasicAuth,
    FullSsl,
    Port,
}

impl DomainField {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "expire" => Ok(DomainField::Expire),
            "ip" => Ok(DomainField::Ip),
            "basic-auth" | "basicauth" => Ok(DomainField::BasicAuth),
            "full-ssl" => Ok(DomainField::FullSsl),
            "port" => Ok(DomainField::Port),
            other => Err(LifecycleError::UnknownParameter(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainField::Expire => "expire",
            DomainField::Ip => "ip",
            DomainField::BasicAuth => "basic-auth",
            DomainField::FullSsl => "full-ssl",
            DomainField::Port => "port",
        }
    }

    /// Whether the field is rendered into the proxy config
    pub fn affects_config(&self) -> bool {
        !matches!(self, DomainField::Expire)
    }
}

pub struct DomainManager {
    settings: RwLock<Arc<DomainSettings>>,
    repository: Arc<dyn DomainRepository>,
    reconciler: Arc<dyn ProxyReconciler>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
    operation_timeout: Duration,
}

impl DomainManager {
    pub fn new(
        settings: DomainSettings,
        repository: Arc<dyn DomainRepository>,
        reconciler: Arc<dyn ProxyReconciler>,
    ) -> Self {
        Self {
            settings: RwLock::new(Arc::new(settings)),
            repository,
            reconciler,
            clock: Arc::new(SystemClock),
            locks: KeyedLocks::new(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Current configuration snapshot
    pub fn settings(&self) -> Arc<DomainSettings> {
        match self.settings.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Swap the configuration used by subsequent operations
    ///
    /// Operations already running keep the snapshot they started with.
    pub fn reload_settings(&self, settings: DomainSettings) {
        let parent = settings.parent_domain.clone();
        match self.settings.write() {
            Ok(mut guard) => *guard = Arc::new(settings),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(settings),
        }
        info!(parent_domain = %parent, "Domain settings reloaded");
    }

    pub async fn create(&self, owner_id: &str, owner_name: &str, ip: &str) -> Result<Domain> {
        let settings = self.settings();
        let ip = settings.policy.check(ip)?;

        match self.find_by_owner(owner_id).await {
            Ok(existing) => {
                return Err(LifecycleError::Conflict(format!(
                    "you already have domain {}",
                    existing.fqdn
                )))
            }
            Err(LifecycleError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let fqdn = format!("{}.{}", subdomain(owner_name), settings.parent_domain);
        let _guard = self.locks.lock(&fqdn).await;

        let now = self.clock.now();
        let domain = Domain {
            fqdn: fqdn.clone(),
            ip: ip.to_string(),
            owner_id: owner_id.to_string(),
            owner_name: owner_name.to_string(),
            created_at: now,
            delete_at: self.deadline(&settings),
            basic_auth: true,
            full_ssl: false,
            port: DEFAULT_HTTP_PORT.to_string(),
        };

        bounded(
            "proxy config create",
            self.operation_timeout,
            self.reconciler.create(&domain),
        )
        .await?;

        let persisted = bounded(
            "domain create",
            self.operation_timeout,
            self.repository.create_domain(&domain),
        )
        .await;
        if let Err(err) = persisted {
            warn!(fqdn = %fqdn, error = %err, "Persisting domain failed, removing its config");
            let cleanup = bounded(
                "proxy config delete",
                self.operation_timeout,
                self.reconciler.delete(&fqdn),
            )
            .await;
            if let Err(cleanup_err) = cleanup {
                error!(fqdn = %fqdn, error = %cleanup_err, "Failed to remove config of unpersisted domain");
            }
            return Err(err);
        }

        info!(
            fqdn = %domain.fqdn,
            ip = %domain.ip,
            owner_id = %owner_id,
            delete_at = %domain.delete_at,
            "Created domain"
        );
        Ok(domain)
    }

    pub async fn update(&self, owner_id: &str, field: &str, value: &str) -> Result<Domain> {
        let field = DomainField::parse(field)?;
        let settings = self.settings();

        let fqdn = self.find_by_owner(owner_id).await?.fqdn;
        let _guard = self.locks.lock(&fqdn).await;

        // Re-read under the lock: a reclaim may have won the race
        let previous = self.find_by_owner(owner_id).await?;
        if previous.fqdn != fqdn {
            return Err(LifecycleError::NotFound(format!(
                "domain {} no longer exists",
                fqdn
            )));
        }

        let mut next = previous.clone();
        match field {
            DomainField::Expire => next.delete_at = self.deadline(&settings),
            DomainField::Ip => next.ip = settings.policy.check(value)?.to_string(),
            DomainField::BasicAuth => next.basic_auth = parse_bool(field, value)?,
            DomainField::FullSsl => next.full_ssl = parse_bool(field, value)?,
            DomainField::Port => next.port = parse_port(value)?,
        }

        if field.affects_config() {
            next.normalize_port();
            bounded(
                "proxy config replace",
                self.operation_timeout,
                self.reconciler.replace(&previous, &next),
            )
            .await?;
        }

        let persisted = bounded(
            "domain update",
            self.operation_timeout,
            self.repository.update_domain(&next),
        )
        .await;
        if let Err(err) = persisted {
            if field.affects_config() {
                warn!(fqdn = %fqdn, error = %err, "Persisting update failed, restoring previous config");
                let restore = bounded(
                    "proxy config replace",
                    self.operation_timeout,
                    self.reconciler.replace(&next, &previous),
                )
                .await;
                if let Err(restore_err) = restore {
                    error!(fqdn = %fqdn, error = %restore_err, "Failed to restore previous config");
                }
            }
            return Err(vanished_as_not_found(err, &fqdn));
        }

        info!(fqdn = %fqdn, field = field.as_str(), "Updated domain");
        Ok(next)
    }

    /// Delete the owner's domain, attempting both the config and the record
    pub async fn delete(&self, owner_id: &str) -> Result<Domain> {
        let fqdn = self.find_by_owner(owner_id).await?.fqdn;
        let _guard = self.locks.lock(&fqdn).await;

        let domain = self.find_by_owner(owner_id).await?;
        if domain.fqdn != fqdn {
            return Err(LifecycleError::NotFound(format!(
                "domain {} no longer exists",
                fqdn
            )));
        }

        let config = bounded(
            "proxy config delete",
            self.operation_timeout,
            self.reconciler.delete(&domain.fqdn),
        )
        .await;
        if let Err(err) = &config {
            error!(fqdn = %domain.fqdn, error = %err, "Failed to delete domain config");
        }

        let record = bounded(
            "domain delete",
            self.operation_timeout,
            self.repository.delete_domain_by_fqdn(&domain.fqdn),
        )
        .await;
        if let Err(err) = &record {
            error!(fqdn = %domain.fqdn, error = %err, "Failed to delete domain record");
        }

        config?;
        record.map_err(|err| vanished_as_not_found(err, &domain.fqdn))?;

        info!(fqdn = %domain.fqdn, owner_id = %owner_id, "Deleted domain");
        Ok(domain)
    }

    pub async fn get(&self, owner_id: &str) -> Result<Domain> {
        self.find_by_owner(owner_id).await
    }

    /// Domains that are not [`ExpiryState::Active`], already expired ones included
    pub async fn expiring_soon(&self) -> Result<Vec<Domain>> {
        let settings = self.settings();
        let now = self.clock.now();
        let due = self.list_due_by(now + settings.warning_window).await?;
        Ok(due
            .into_iter()
            .filter(|d| classify(d.delete_at, now, settings.warning_window) != ExpiryState::Active)
            .collect())
    }

    pub async fn expired(&self) -> Result<Vec<Domain>> {
        let settings = self.settings();
        let now = self.clock.now();
        let due = self.list_due_by(now).await?;
        Ok(due
            .into_iter()
            .filter(|d| classify(d.delete_at, now, settings.warning_window) == ExpiryState::Expired)
            .collect())
    }

    /// Reclaim every expired domain
    ///
    /// One failing domain never blocks the others. Failures are collected into
    /// a [`BatchFailure`] that also lists the owners that were reclaimed.
    pub async fn delete_expired(&self) -> Result<Vec<Domain>> {
        let candidates = self.expired().await?;
        let mut reclaimed = Vec::with_capacity(candidates.len());
        let mut batch = BatchFailure::default();

        for candidate in candidates {
            let _guard = self.locks.lock(&candidate.fqdn).await;
            match self.reclaim(&candidate).await {
                Ok(true) => reclaimed.push(candidate),
                Ok(false) => {}
                Err(err) => {
                    warn!(fqdn = %candidate.fqdn, error = %err, "Failed to reclaim domain");
                    batch.push(candidate.fqdn.clone(), err);
                }
            }
        }
        self.locks.prune();

        if batch.is_empty() {
            if !reclaimed.is_empty() {
                info!(count = reclaimed.len(), "Reclaimed expired domains");
            }
            return Ok(reclaimed);
        }
        batch.reclaimed = reclaimed.into_iter().map(|d| d.owner_id).collect();
        Err(batch.into())
    }

    // Ok(false) when the domain was renewed or removed since it was listed
    async fn reclaim(&self, candidate: &Domain) -> Result<bool> {
        let current = match self.find_by_owner(&candidate.owner_id).await {
            Ok(current) if current.fqdn == candidate.fqdn => current,
            Ok(_) | Err(LifecycleError::NotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        };
        if current.delete_at > self.clock.now() {
            debug!(fqdn = %current.fqdn, "Domain renewed before reclaim");
            return Ok(false);
        }

        let config = bounded(
            "proxy config delete",
            self.operation_timeout,
            self.reconciler.delete(&current.fqdn),
        )
        .await;
        match config {
            Ok(()) => {}
            Err(LifecycleError::Reconcile(ReconcileError::ConfigMissing(_))) => {
                warn!(fqdn = %current.fqdn, "Config already missing, deleting record anyway");
            }
            Err(err) => return Err(err),
        }

        bounded(
            "domain delete",
            self.operation_timeout,
            self.repository.delete_domain_by_fqdn(&current.fqdn),
        )
        .await?;
        Ok(true)
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Domain> {
        bounded(
            "domain lookup",
            self.operation_timeout,
            self.repository.get_domain_by_owner(owner_id),
        )
        .await
        .map_err(|err| match err {
            LifecycleError::Repository(RepositoryError::NotFound) => {
                LifecycleError::NotFound("you don't have any domain".to_string())
            }
            other => other,
        })
    }

    async fn list_due_by(&self, deadline: DateTime<Utc>) -> Result<Vec<Domain>> {
        bounded(
            "domain list",
            self.operation_timeout,
            self.repository.list_domains_due_by(deadline),
        )
        .await
    }

    fn deadline(&self, settings: &DomainSettings) -> DateTime<Utc> {
        retention_deadline(
            self.clock.now(),
            settings.retention,
            settings.notify_hour,
            settings.utc_offset,
        )
    }
}

fn vanished_as_not_found(err: LifecycleError, fqdn: &str) -> LifecycleError {
    match err {
        LifecycleError::Repository(RepositoryError::NotFound)
        | LifecycleError::Repository(RepositoryError::NoRowsAffected) => {
            LifecycleError::NotFound(format!("domain {} no longer exists", fqdn))
        }
        other => other,
    }
}

/// Parse a boolean the way the command surface accepts it
pub fn parse_bool(field: DomainField, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        _ => Err(LifecycleError::InvalidValue {
            param: field.as_str().to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_port(value: &str) -> Result<String> {
    let value = value.trim();
    match value.parse::<u32>() {
        Ok(port) if (1..=65535).contains(&port) => Ok(port.to_string()),
        _ => Err(LifecycleError::InvalidPort(value.to_string())),
    }
}
