//! Outbound message seam

use crate::error::NotifyError;
use async_trait::async_trait;

/// Posts plain text to a channel name or a user id
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post(&self, target: &str, text: &str) -> Result<(), NotifyError>;
}

/// Format a user mention understood by the chat platform
pub fn mention(user_id: &str) -> String {
    format!("<@{}>", user_id)
}
