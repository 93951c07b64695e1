//! Error taxonomy for the lifecycle engine

use devhelper_policy::PolicyError;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification used by callers to decide how to present an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// User-correctable input problem, never retried
    Validation,
    /// Resource already exists
    Conflict,
    /// Nothing to act on
    NotFound,
    /// Filesystem, template, reload, remote API or datastore failure
    Reconciliation,
    /// Some resources of a sweep could not be reclaimed
    PartialBatch,
}

/// Errors reported by repository implementations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("no rows affected")]
    NoRowsAffected,

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("datastore error: {0}")]
    Backend(String),
}

/// Errors reported by proxy configuration reconcilers
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("config for {0} already exists")]
    ConfigAlreadyExists(String),

    #[error("config for {0} does not exist")]
    ConfigMissing(String),

    #[error("invalid config name: {0}")]
    InvalidName(String),

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("template error: {0}")]
    Template(String),

    #[error("`{command}` failed: {stderr}")]
    Reload { command: String, stderr: String },
}

/// Errors reported by the remote account API
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("remote user {0} not found")]
    UserNotFound(String),

    #[error("remote user {0} already exists")]
    UserExists(String),

    #[error("organization {0} not found")]
    OrganizationNotFound(String),

    #[error("account API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("account API request failed: {0}")]
    Transport(String),

    #[error("unexpected account API response: {0}")]
    Decode(String),
}

/// Errors reported by notifiers
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Errors reported by flag caches
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("flag cache backend error: {0}")]
    Backend(String),
}

/// One resource that a sweep failed to reclaim
#[derive(Debug)]
pub struct ResourceFailure {
    pub resource: String,
    pub cause: LifecycleError,
}

/// Aggregate error of a reclaim sweep
///
/// `reclaimed` carries the dedup keys (owner id for domains, email for VPN
/// accounts) of the resources that were reclaimed despite the failures.
#[derive(Debug, Default)]
pub struct BatchFailure {
    pub failures: Vec<ResourceFailure>,
    pub reclaimed: Vec<String>,
}

impl BatchFailure {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn push(&mut self, resource: impl Into<String>, cause: LifecycleError) {
        self.failures.push(ResourceFailure {
            resource: resource.into(),
            cause,
        });
    }
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} resource(s) failed to reclaim", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.resource, failure.cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for BatchFailure {}

/// Errors returned by the lifecycle managers
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("invalid port {0}: port must be in range 1-65535")]
    InvalidPort(String),

    #[error("invalid value '{value}' for {param}")]
    InvalidValue { param: String, value: String },

    #[error("invalid duration {hours}h, allowed: {allowed}")]
    InvalidDuration { hours: u32, allowed: String },

    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error(transparent)]
    Batch(#[from] BatchFailure),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::Policy(_)
            | LifecycleError::InvalidPort(_)
            | LifecycleError::InvalidValue { .. }
            | LifecycleError::InvalidDuration { .. }
            | LifecycleError::UnknownParameter(_)
            | LifecycleError::Reconcile(ReconcileError::InvalidName(_)) => ErrorKind::Validation,

            LifecycleError::Conflict(_)
            | LifecycleError::Reconcile(ReconcileError::ConfigAlreadyExists(_))
            | LifecycleError::Repository(RepositoryError::Duplicate(_))
            | LifecycleError::Account(AccountError::UserExists(_)) => ErrorKind::Conflict,

            LifecycleError::NotFound(_)
            | LifecycleError::Repository(RepositoryError::NotFound)
            | LifecycleError::Repository(RepositoryError::NoRowsAffected)
            | LifecycleError::Account(AccountError::UserNotFound(_)) => ErrorKind::NotFound,

            LifecycleError::Batch(_) => ErrorKind::PartialBatch,

            _ => ErrorKind::Reconciliation,
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
