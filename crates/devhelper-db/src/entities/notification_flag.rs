//! NotificationFlag entity: one row per reminder already delivered

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_flags")]
pub struct Model {
    /// Flag namespace, e.g. "domain_notified"
    #[sea_orm(primary_key, auto_increment = false)]
    pub namespace: String,

    /// Owner id or email, depending on the namespace
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
