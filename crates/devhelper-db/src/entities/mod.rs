//! Database entities

pub mod domain;
pub mod notification_flag;
pub mod vpn_account;

pub use domain::Entity as Domain;
pub use notification_flag::Entity as NotificationFlag;
pub use vpn_account::Entity as VpnAccount;

pub mod prelude {
    pub use super::domain::Entity as Domain;
    pub use super::notification_flag::Entity as NotificationFlag;
    pub use super::vpn_account::Entity as VpnAccount;
}
