//! Proxy configuration seam

use crate::error::ReconcileError;
use crate::model::Domain;
use async_trait::async_trait;

/// Materializes one virtual-host configuration per domain
///
/// Mutations are write-then-verify: a failed reload after `create` or
/// `delete` leaves the file mutation in place.
#[async_trait]
pub trait ProxyReconciler: Send + Sync {
    /// Fails with [`ReconcileError::ConfigAlreadyExists`] if a config for the fqdn exists
    async fn create(&self, domain: &Domain) -> Result<(), ReconcileError>;

    /// Fails with [`ReconcileError::ConfigMissing`] if no config exists
    async fn delete(&self, fqdn: &str) -> Result<(), ReconcileError>;

    /// Atomically swap the config of `previous` for the rendering of `next`
    ///
    /// On reload failure the previous content is restored.
    async fn replace(&self, previous: &Domain, next: &Domain) -> Result<(), ReconcileError>;

    async fn exists(&self, fqdn: &str) -> Result<bool, ReconcileError>;
}
