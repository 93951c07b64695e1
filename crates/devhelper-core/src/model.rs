//! Resource types managed by the lifecycle engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const SCHEME_HTTP: &str = "http";
pub const SCHEME_HTTPS: &str = "https";

pub const DEFAULT_HTTP_PORT: &str = "80";
pub const DEFAULT_HTTPS_PORT: &str = "443";

/// A reverse-proxy virtual host owned by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub fqdn: String,
    pub ip: String,
    pub owner_id: String,
    pub owner_name: String,
    pub created_at: DateTime<Utc>,
    /// Sole expiry clock, set on create and on renewal
    pub delete_at: DateTime<Utc>,
    pub basic_auth: bool,
    pub full_ssl: bool,
    pub port: String,
}

impl Domain {
    pub fn scheme(&self) -> &'static str {
        if self.full_ssl {
            SCHEME_HTTPS
        } else {
            SCHEME_HTTP
        }
    }

    /// Value rendered into the `auth_basic` style directive
    pub fn basic_auth_mode(&self) -> &'static str {
        if self.basic_auth {
            "Restricted"
        } else {
            "off"
        }
    }

    /// Swap the backend port to the scheme default when it still carries the
    /// other scheme's default (or nothing at all)
    pub fn normalize_port(&mut self) {
        if self.full_ssl {
            if self.port.is_empty() || self.port == DEFAULT_HTTP_PORT {
                self.port = DEFAULT_HTTPS_PORT.to_string();
            }
        } else if self.port.is_empty() || self.port == DEFAULT_HTTPS_PORT {
            self.port = DEFAULT_HTTP_PORT.to_string();
        }
    }
}

/// Local tracking record of a duration-bound VPN session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnAccount {
    pub id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub deactivate_at: DateTime<Utc>,
    pub active: bool,
}

/// A user as seen by the remote account server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub disabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(full_ssl: bool, port: &str) -> Domain {
        let now = Utc::now();
        Domain {
            fqdn: "a-lee.dev.example".into(),
            ip: "10.1.2.5".into(),
            owner_id: "U1".into(),
            owner_name: "Ann Lee".into(),
            created_at: now,
            delete_at: now,
            basic_auth: true,
            full_ssl,
            port: port.into(),
        }
    }

    #[test]
    fn test_normalize_port_follows_scheme() {
        let mut d = domain(true, "80");
        d.normalize_port();
        assert_eq!(d.port, "443");
        assert_eq!(d.scheme(), "https");

        let mut d = domain(false, "443");
        d.normalize_port();
        assert_eq!(d.port, "80");
        assert_eq!(d.scheme(), "http");

        let mut d = domain(false, "");
        d.normalize_port();
        assert_eq!(d.port, "80");
    }

    #[test]
    fn test_normalize_port_keeps_custom_port() {
        let mut d = domain(true, "8443");
        d.normalize_port();
        assert_eq!(d.port, "8443");

        let mut d = domain(false, "3000");
        d.normalize_port();
        assert_eq!(d.port, "3000");
    }

    #[test]
    fn test_basic_auth_mode() {
        let mut d = domain(false, "80");
        assert_eq!(d.basic_auth_mode(), "Restricted");
        d.basic_auth = false;
        assert_eq!(d.basic_auth_mode(), "off");
    }
}
