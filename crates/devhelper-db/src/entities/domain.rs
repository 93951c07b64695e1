//! Domain entity, one reverse-proxy virtual host per owner

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "domains")]
pub struct Model {
    /// Fully qualified domain name (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub fqdn: String,

    /// Backend address the proxy forwards to
    pub ip: String,

    /// Chat user id of the owner
    #[sea_orm(unique)]
    pub owner_id: String,

    pub owner_name: String,

    pub created_at: ChronoDateTimeUtc,

    /// When the sweep reclaims this domain
    pub delete_at: ChronoDateTimeUtc,

    pub basic_auth: bool,

    pub full_ssl: bool,

    /// Backend port, kept as text so the template renders it verbatim
    pub port: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for devhelper_core::Domain {
    fn from(model: Model) -> Self {
        Self {
            fqdn: model.fqdn,
            ip: model.ip,
            owner_id: model.owner_id,
            owner_name: model.owner_name,
            created_at: model.created_at,
            delete_at: model.delete_at,
            basic_auth: model.basic_auth,
            full_ssl: model.full_ssl,
            port: model.port,
        }
    }
}

impl From<&devhelper_core::Domain> for ActiveModel {
    fn from(domain: &devhelper_core::Domain) -> Self {
        use sea_orm::Set;
        Self {
            fqdn: Set(domain.fqdn.clone()),
            ip: Set(domain.ip.clone()),
            owner_id: Set(domain.owner_id.clone()),
            owner_name: Set(domain.owner_name.clone()),
            created_at: Set(domain.created_at),
            delete_at: Set(domain.delete_at),
            basic_auth: Set(domain.basic_auth),
            full_ssl: Set(domain.full_ssl),
            port: Set(domain.port.clone()),
        }
    }
}
