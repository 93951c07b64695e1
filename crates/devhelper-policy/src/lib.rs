//! Network policy for addresses bound to proxied domains
//!
//! Decides whether a caller-supplied IP may be routed by a new or updated
//! virtual host. The check is a pure function of the configured allow/deny
//! lists and the candidate: nothing is cached between calls, so a
//! configuration reload can never race with a check in flight.
//!
//! Allowed entries use CIDR notation (e.g. "10.1.0.0/16"); denied entries are
//! single addresses, optionally written with a prefix ("10.1.2.7/32").

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Reasons a candidate address is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Candidate is not an IP literal
    #[error("this IP looks invalid: {0}")]
    InvalidAddress(String),

    /// Candidate is routable on the public internet
    #[error("provided ip {0} is not private")]
    NotPrivate(IpAddr),

    /// Candidate is private but outside every office network
    #[error("provided ip {0} does not belong to any of the office networks")]
    NotInOfficeNetwork(IpAddr),

    /// Candidate is the network address of an office network
    #[error("{0} is a network address, please provide a host address")]
    NetworkAddressSupplied(IpAddr),

    /// Candidate is explicitly denied by administration
    #[error("you can't use {0}, its usage is denied by administration")]
    Denied(IpAddr),

    /// A configured allow or deny entry could not be parsed
    #[error("invalid policy entry '{0}', contact the bot admin")]
    InvalidCidr(String),
}

/// Serialized form of the policy, as it appears in configuration files
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Office networks in CIDR notation
    #[serde(default)]
    pub allowed_subnets: Vec<String>,
    /// Addresses that may never be bound
    #[serde(default)]
    pub denied_ips: Vec<String>,
}

/// Parsed, immutable policy snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkPolicy {
    allowed: Vec<IpNetwork>,
    denied: Vec<IpAddr>,
}

impl NetworkPolicy {
    /// Parse allow and deny lists into a snapshot
    ///
    /// Malformed entries are reported instead of skipped, so a typo in the
    /// configuration cannot silently widen or narrow the policy.
    pub fn from_config(allowed: &[String], denied: &[String]) -> Result<Self, PolicyError> {
        let allowed = allowed
            .iter()
            .map(|entry| {
                IpNetwork::from_str(entry.trim())
                    .map_err(|_| PolicyError::InvalidCidr(entry.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let denied = denied
            .iter()
            .map(|entry| parse_denied(entry))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { allowed, denied })
    }

    /// Build a snapshot from a [`PolicyConfig`]
    pub fn from_policy_config(config: &PolicyConfig) -> Result<Self, PolicyError> {
        Self::from_config(&config.allowed_subnets, &config.denied_ips)
    }

    /// Check a candidate address against this snapshot
    ///
    /// Steps run in a fixed order and stop at the first failure:
    /// parse, private range, office network, network address, deny list.
    pub fn check(&self, candidate: &str) -> Result<IpAddr, PolicyError> {
        let ip = IpAddr::from_str(candidate.trim())
            .map_err(|_| PolicyError::InvalidAddress(candidate.to_string()))?;

        if !is_private(&ip) {
            return Err(PolicyError::NotPrivate(ip));
        }

        let mut in_office = false;
        for network in self.allowed.iter().filter(|n| n.contains(ip)) {
            if has_host_part(network) && network.network() == ip {
                return Err(PolicyError::NetworkAddressSupplied(ip));
            }
            in_office = true;
        }
        if !in_office {
            return Err(PolicyError::NotInOfficeNetwork(ip));
        }

        if self.denied.contains(&ip) {
            return Err(PolicyError::Denied(ip));
        }

        Ok(ip)
    }

    /// Number of configured office networks
    pub fn allowed_len(&self) -> usize {
        self.allowed.len()
    }
}

/// One-shot check over raw configuration lists
pub fn check_allowed(
    allowed: &[String],
    denied: &[String],
    candidate: &str,
) -> Result<IpAddr, PolicyError> {
    NetworkPolicy::from_config(allowed, denied)?.check(candidate)
}

/// Whether an address belongs to a private, loopback or link-local range
///
/// Covers RFC1918, 127.0.0.0/8, 169.254.0.0/16, ::1, fe80::/10 and fc00::/7.
pub fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

fn parse_denied(entry: &str) -> Result<IpAddr, PolicyError> {
    let addr = entry.trim().split('/').next().unwrap_or_default();
    IpAddr::from_str(addr).map_err(|_| PolicyError::InvalidCidr(entry.to_string()))
}

// A /32 (or /128) entry names a single host, so its "network address" is the host itself.
fn has_host_part(network: &IpNetwork) -> bool {
    match network {
        IpNetwork::V4(n) => n.prefix() < 32,
        IpNetwork::V6(n) => n.prefix() < 128,
    }
}
