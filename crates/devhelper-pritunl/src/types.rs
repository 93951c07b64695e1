//! Wire types of the account server API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub user_count: u32,
}

/// A user record
///
/// Fields this client does not model are kept in `extra` so that a
/// read-modify-write `PUT` sends them back untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub organization_name: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<User> for devhelper_core::RemoteUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            disabled: user.disabled,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub organization: &'a str,
}

/// Download links of a user's profile bundle
#[derive(Debug, Clone, Deserialize)]
pub struct Key {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub key_url: String,
    pub key_zip_url: String,
    #[serde(default)]
    pub key_onc_url: String,
    #[serde(default)]
    pub view_url: String,
    #[serde(default)]
    pub uri_url: String,
}
