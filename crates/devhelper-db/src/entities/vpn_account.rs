//! VpnAccount entity tracking a duration-bound VPN session

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vpn_accounts")]
pub struct Model {
    /// Record ID (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_name: String,

    pub user_email: String,

    /// Chat user id of the requester
    pub owner_id: String,

    pub created_at: ChronoDateTimeUtc,

    pub deactivate_at: ChronoDateTimeUtc,

    /// Cleared once the remote user is disabled or the session is superseded
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for devhelper_core::VpnAccount {
    type Error = uuid::Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: uuid::Uuid::parse_str(&model.id)?,
            user_name: model.user_name,
            user_email: model.user_email,
            owner_id: model.owner_id,
            created_at: model.created_at,
            deactivate_at: model.deactivate_at,
            active: model.active,
        })
    }
}

impl From<&devhelper_core::VpnAccount> for ActiveModel {
    fn from(account: &devhelper_core::VpnAccount) -> Self {
        use sea_orm::Set;
        Self {
            id: Set(account.id.to_string()),
            user_name: Set(account.user_name.clone()),
            user_email: Set(account.user_email.clone()),
            owner_id: Set(account.owner_id.clone()),
            created_at: Set(account.created_at),
            deactivate_at: Set(account.deactivate_at),
            active: Set(account.active),
        }
    }
}
