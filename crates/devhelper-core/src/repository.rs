//! Persistence seams for domains and VPN tracking records

use crate::error::RepositoryError;
use crate::model::{Domain, VpnAccount};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Storage for [`Domain`] records
///
/// Implementations must enforce one record per `owner_id` and per `fqdn`,
/// reporting violations as [`RepositoryError::Duplicate`].
#[async_trait]
pub trait DomainRepository: Send + Sync {
    async fn create_domain(&self, domain: &Domain) -> Result<(), RepositoryError>;

    /// Fails with [`RepositoryError::NotFound`] when the owner has no domain
    async fn get_domain_by_owner(&self, owner_id: &str) -> Result<Domain, RepositoryError>;

    /// Overwrites the record with the same `fqdn`
    ///
    /// Fails with [`RepositoryError::NoRowsAffected`] if the record vanished.
    async fn update_domain(&self, domain: &Domain) -> Result<(), RepositoryError>;

    async fn delete_domain_by_fqdn(&self, fqdn: &str) -> Result<(), RepositoryError>;

    /// All domains whose `delete_at` is at or before `deadline`
    async fn list_domains_due_by(
        &self,
        deadline: DateTime<Utc>,
    ) -> Result<Vec<Domain>, RepositoryError>;
}

/// Storage for [`VpnAccount`] tracking records
#[async_trait]
pub trait VpnRepository: Send + Sync {
    async fn create_account(&self, account: &VpnAccount) -> Result<(), RepositoryError>;

    /// Fails with [`RepositoryError::NotFound`] when no active record exists
    async fn get_active_by_email(&self, email: &str) -> Result<VpnAccount, RepositoryError>;

    async fn set_inactive(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// Active records whose `deactivate_at` is at or before `deadline`
    async fn list_active_due_by(
        &self,
        deadline: DateTime<Utc>,
    ) -> Result<Vec<VpnAccount>, RepositoryError>;
}
