//! Remote account server seam

use crate::error::AccountError;
use crate::model::RemoteUser;
use async_trait::async_trait;

/// Operations the VPN manager needs from the remote account server
///
/// Every call is scoped to the configured organization.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// Look up a user by email; `Ok(None)` when absent
    async fn find_user(&self, email: &str) -> Result<Option<RemoteUser>, AccountError>;

    /// Create a user, refusing an existing email or name
    async fn create_user(&self, name: &str, email: &str) -> Result<RemoteUser, AccountError>;

    async fn delete_user(&self, email: &str) -> Result<(), AccountError>;

    async fn set_user_disabled(&self, email: &str, disabled: bool) -> Result<(), AccountError>;

    /// Download URL of the user's credential bundle
    async fn config_url(&self, email: &str) -> Result<String, AccountError>;
}
