//! Ephemeral VPN lifecycle manager
//!
//! Timed sessions reuse one remote account per email. The remote account is
//! enabled for the requested number of hours and disabled again by the
//! reclaim sweep; a local tracking record carries the deadline.

use crate::account::AccountApi;
use crate::error::{AccountError, BatchFailure, LifecycleError, RepositoryError, Result};
use crate::expiry::{classify, Clock, ExpiryState, SystemClock};
use crate::locks::KeyedLocks;
use crate::model::VpnAccount;
use crate::repository::VpnRepository;
use crate::timeout::bounded;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_SESSION_HOURS: [u32; 3] = [1, 2, 4];

#[derive(Debug, Clone)]
pub struct VpnSettings {
    /// Durations, in hours, a timed session may be requested for
    pub allowed_hours: Vec<u32>,
    /// How long before `deactivate_at` a session counts as expiring soon
    pub warning_window: chrono::Duration,
}

impl Default for VpnSettings {
    fn default() -> Self {
        Self {
            allowed_hours: DEFAULT_SESSION_HOURS.to_vec(),
            warning_window: chrono::Duration::minutes(10),
        }
    }
}

/// What [`VpnManager::get_or_create_timed_session`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A remote user was created and a session started
    Created { deactivate_at: DateTime<Utc> },
    /// A disabled remote user was re-enabled and a session started
    Reactivated { deactivate_at: DateTime<Utc> },
    /// A session was already running; its deadline is untouched
    AlreadyActive { deactivate_at: DateTime<Utc> },
    /// The remote user is enabled without a timed session
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedSession {
    pub config_url: String,
    pub outcome: SessionOutcome,
}

pub struct VpnManager {
    settings: VpnSettings,
    api: Arc<dyn AccountApi>,
    repository: Arc<dyn VpnRepository>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
    operation_timeout: Duration,
}

impl VpnManager {
    pub fn new(
        settings: VpnSettings,
        api: Arc<dyn AccountApi>,
        repository: Arc<dyn VpnRepository>,
    ) -> Self {
        Self {
            settings,
            api,
            repository,
            clock: Arc::new(SystemClock),
            locks: KeyedLocks::new(),
            operation_timeout: crate::domain::DEFAULT_OPERATION_TIMEOUT,
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

    pub fn settings(&self) -> &VpnSettings {
        &self.settings
    }

    pub async fn get_config_url(&self, email: &str) -> Result<String> {
        bounded(
            "account config url",
            self.operation_timeout,
            self.api.config_url(email),
        )
        .await
    }

    pub async fn create_user(&self, name: &str, email: &str) -> Result<()> {
        let _guard = self.locks.lock(email).await;
        let user = bounded(
            "account create",
            self.operation_timeout,
            self.api.create_user(name, email),
        )
        .await?;
        info!(email = %email, user_id = %user.id, "Created VPN user");
        Ok(())
    }

    /// Delete the remote user and close its timed session, if any
    pub async fn delete_user(&self, email: &str) -> Result<()> {
        let _guard = self.locks.lock(email).await;
        let deleted = bounded(
            "account delete",
            self.operation_timeout,
            self.api.delete_user(email),
        )
        .await;

        // A user already gone remotely must not leave a session to reclaim
        if matches!(
            deleted,
            Ok(()) | Err(LifecycleError::Account(AccountError::UserNotFound(_)))
        ) {
            if let Some(session) = self.active_record(email).await? {
                self.close_record(&session).await?;
            }
        }

        deleted?;
        info!(email = %email, "Deleted VPN user");
        Ok(())
    }

    /// Start (or report) a duration-bound session and return the credential URL
    pub async fn get_or_create_timed_session(
        &self,
        name: &str,
        email: &str,
        owner_id: &str,
        hours: u32,
    ) -> Result<TimedSession> {
        if !self.settings.allowed_hours.contains(&hours) {
            return Err(LifecycleError::InvalidDuration {
                hours,
                allowed: self
                    .settings
                    .allowed_hours
                    .iter()
                    .map(|h| h.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        let _guard = self.locks.lock(email).await;

        let remote = bounded(
            "account lookup",
            self.operation_timeout,
            self.api.find_user(email),
        )
        .await?;

        let outcome = match remote {
            None => {
                bounded(
                    "account create",
                    self.operation_timeout,
                    self.api.create_user(name, email),
                )
                .await?;
                let deactivate_at = self.start_session(name, email, owner_id, hours).await?;
                info!(email = %email, hours, "Created timed VPN user");
                SessionOutcome::Created { deactivate_at }
            }
            Some(user) if user.disabled => {
                bounded(
                    "account enable",
                    self.operation_timeout,
                    self.api.set_user_disabled(email, false),
                )
                .await?;
                let deactivate_at = self.start_session(name, email, owner_id, hours).await?;
                info!(email = %email, hours, "Reactivated timed VPN user");
                SessionOutcome::Reactivated { deactivate_at }
            }
            Some(_) => match self.active_record(email).await? {
                Some(account) => {
                    debug!(email = %email, deactivate_at = %account.deactivate_at, "Timed session already running");
                    SessionOutcome::AlreadyActive {
                        deactivate_at: account.deactivate_at,
                    }
                }
                None => SessionOutcome::Permanent,
            },
        };

        let config_url = self.get_config_url(email).await?;
        Ok(TimedSession {
            config_url,
            outcome,
        })
    }

    /// Active sessions within the warning window, already expired ones included
    pub async fn expiring_soon(&self) -> Result<Vec<VpnAccount>> {
        let now = self.clock.now();
        let window = self.settings.warning_window;
        let due = self.list_due_by(now + window).await?;
        Ok(due
            .into_iter()
            .filter(|a| classify(a.deactivate_at, now, window) != ExpiryState::Active)
            .collect())
    }

    pub async fn expired(&self) -> Result<Vec<VpnAccount>> {
        let now = self.clock.now();
        let window = self.settings.warning_window;
        let due = self.list_due_by(now).await?;
        Ok(due
            .into_iter()
            .filter(|a| classify(a.deactivate_at, now, window) == ExpiryState::Expired)
            .collect())
    }

    /// Disable every expired session's remote user and close its record
    pub async fn deactivate_expired(&self) -> Result<Vec<VpnAccount>> {
        let candidates = self.expired().await?;
        let mut deactivated = Vec::with_capacity(candidates.len());
        let mut batch = BatchFailure::default();

        for account in candidates {
            let _guard = self.locks.lock(&account.user_email).await;
            match self.deactivate(&account).await {
                Ok(true) => deactivated.push(account),
                Ok(false) => {}
                Err(err) => {
                    warn!(email = %account.user_email, error = %err, "Failed to deactivate VPN user");
                    batch.push(account.user_email.clone(), err);
                }
            }
        }
        self.locks.prune();

        if batch.is_empty() {
            if !deactivated.is_empty() {
                info!(count = deactivated.len(), "Deactivated expired VPN sessions");
            }
            return Ok(deactivated);
        }
        batch.reclaimed = deactivated.into_iter().map(|a| a.user_email).collect();
        Err(batch.into())
    }

    // Ok(false) when the session was closed or replaced since it was listed
    async fn deactivate(&self, account: &VpnAccount) -> Result<bool> {
        match self.active_record(&account.user_email).await? {
            Some(current) if current.id == account.id => {}
            _ => {
                debug!(email = %account.user_email, "VPN session replaced before reclaim");
                return Ok(false);
            }
        }

        let disabled = bounded(
            "account disable",
            self.operation_timeout,
            self.api.set_user_disabled(&account.user_email, true),
        )
        .await;
        match disabled {
            Ok(()) => {}
            Err(LifecycleError::Account(AccountError::UserNotFound(_))) => {
                warn!(email = %account.user_email, "Remote user already gone, closing session anyway");
            }
            Err(err) => return Err(err),
        }

        self.close_record(account).await?;
        Ok(true)
    }

    async fn close_record(&self, account: &VpnAccount) -> Result<()> {
        bounded(
            "vpn record close",
            self.operation_timeout,
            self.repository.set_inactive(account.id),
        )
        .await
    }

    // Closes any prior active record so at most one stays active per email
    async fn start_session(
        &self,
        name: &str,
        email: &str,
        owner_id: &str,
        hours: u32,
    ) -> Result<DateTime<Utc>> {
        if let Some(stale) = self.active_record(email).await? {
            debug!(email = %email, id = %stale.id, "Closing prior active VPN record");
            self.close_record(&stale).await?;
        }

        let now = self.clock.now();
        let account = VpnAccount {
            id: Uuid::new_v4(),
            user_name: name.to_string(),
            user_email: email.to_string(),
            owner_id: owner_id.to_string(),
            created_at: now,
            deactivate_at: now + chrono::Duration::hours(i64::from(hours)),
            active: true,
        };
        bounded(
            "vpn record create",
            self.operation_timeout,
            self.repository.create_account(&account),
        )
        .await?;
        Ok(account.deactivate_at)
    }

    async fn active_record(&self, email: &str) -> Result<Option<VpnAccount>> {
        match bounded(
            "vpn record lookup",
            self.operation_timeout,
            self.repository.get_active_by_email(email),
        )
        .await
        {
            Ok(account) => Ok(Some(account)),
            Err(LifecycleError::Repository(RepositoryError::NotFound)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn list_due_by(&self, deadline: DateTime<Utc>) -> Result<Vec<VpnAccount>> {
        bounded(
            "vpn record list",
            self.operation_timeout,
            self.repository.list_active_due_by(deadline),
        )
        .await
    }
}
