//! Request and response bodies of the HTTP surface

use devhelper_core::ErrorKind;
use serde::{Deserialize, Serialize};

/// A chat command relayed by the chat gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Chat user id of the requester
    pub user_id: String,
    /// Display name, used to derive the subdomain
    #[serde(default)]
    pub user_name: String,
    /// Requester's email, needed by VPN commands
    #[serde(default)]
    pub user_email: String,
    /// Raw message text
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Text to post back to the requester
    pub text: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl CommandResponse {
    pub fn new(text: String, error: Option<ErrorKind>) -> Self {
        Self {
            text,
            ok: error.is_none(),
            error_kind: error.and_then(|kind| {
                serde_json::to_value(kind)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    pub vpn_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
