//! Notification dedup flags
//!
//! A flag records that an "expiring soon" notice was already sent for one
//! deadline of a resource. Namespaces keep domain owners and VPN emails apart.
//! Keys carry the deadline, so a renewed resource is reminded again.

use crate::error::CacheError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    /// Keyed by domain owner id
    DomainExpiry,
    /// Keyed by VPN user email
    VpnExpiry,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::DomainExpiry => "domain_notified",
            Namespace::VpnExpiry => "vpn_eu_notified",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const KEY_SEPARATOR: char = '#';

/// Flag key for the notice about `resource` expiring at `deadline`
pub fn notice_key(resource: &str, deadline: DateTime<Utc>) -> String {
    format!("{}{}{}", resource, KEY_SEPARATOR, deadline.timestamp())
}

/// Prefix shared by every [`notice_key`] of `resource`
pub fn resource_prefix(resource: &str) -> String {
    format!("{}{}", resource, KEY_SEPARATOR)
}

#[async_trait]
pub trait FlagCache: Send + Sync {
    async fn set_flag(&self, namespace: Namespace, key: &str) -> Result<(), CacheError>;
    async fn has_flag(&self, namespace: Namespace, key: &str) -> Result<bool, CacheError>;
    /// Clearing an absent flag is not an error
    async fn clear_flag(&self, namespace: Namespace, key: &str) -> Result<(), CacheError>;
    /// Clear the flags of every deadline of `resource`
    async fn clear_resource(&self, namespace: Namespace, resource: &str)
        -> Result<(), CacheError>;
}

/// Process-local flag cache, lost on restart
#[derive(Debug, Default)]
pub struct MemoryFlagCache {
    flags: DashSet<(Namespace, String)>,
}

impl MemoryFlagCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

#[async_trait]
impl FlagCache for MemoryFlagCache {
    async fn set_flag(&self, namespace: Namespace, key: &str) -> Result<(), CacheError> {
        self.flags.insert((namespace, key.to_string()));
        Ok(())
    }

    async fn has_flag(&self, namespace: Namespace, key: &str) -> Result<bool, CacheError> {
        Ok(self.flags.contains(&(namespace, key.to_string())))
    }

    async fn clear_flag(&self, namespace: Namespace, key: &str) -> Result<(), CacheError> {
        self.flags.remove(&(namespace, key.to_string()));
        Ok(())
    }

    async fn clear_resource(
        &self,
        namespace: Namespace,
        resource: &str,
    ) -> Result<(), CacheError> {
        let prefix = resource_prefix(resource);
        self.flags
            .retain(|(ns, key)| *ns != namespace || !key.starts_with(&prefix));
        Ok(())
    }
}
