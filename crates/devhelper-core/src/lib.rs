//! Resource lifecycle and reconciliation engine
//!
//! Provisions and reclaims two kinds of user-scoped, expiring resources:
//! reverse-proxy virtual hosts ([`DomainManager`]) and duration-bound VPN
//! sessions ([`VpnManager`]). The [`Scheduler`] drives the reminder and
//! reclaim sweeps; collaborators (datastore, proxy config directory, remote
//! account server, chat) are reached through the traits in this crate.

pub mod account;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod expiry;
pub mod locks;
pub mod model;
pub mod naming;
pub mod notifier;
pub mod reconciler;
pub mod repository;
pub mod scheduler;
pub mod vpn;

mod timeout;

#[cfg(test)]
mod testing;

pub use account::AccountApi;
pub use dedup::{notice_key, resource_prefix, FlagCache, MemoryFlagCache, Namespace};
pub use domain::{DomainField, DomainManager, DomainSettings};
pub use error::{
    AccountError, BatchFailure, CacheError, ErrorKind, LifecycleError, NotifyError,
    ReconcileError, RepositoryError, ResourceFailure,
};
pub use expiry::{classify, retention_deadline, Clock, ExpiryState, FixedClock, SystemClock};
pub use locks::KeyedLocks;
pub use model::{Domain, RemoteUser, VpnAccount};
pub use naming::{subdomain, UNKNOWN_USER};
pub use notifier::Notifier;
pub use reconciler::ProxyReconciler;
pub use repository::{DomainRepository, VpnRepository};
pub use scheduler::{Job, Scheduler, SchedulerSettings};
pub use vpn::{SessionOutcome, TimedSession, VpnManager, VpnSettings};
