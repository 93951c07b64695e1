//! Chat notifiers

use async_trait::async_trait;
use devhelper_core::{Notifier, NotifyError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "https://slack.com/api";

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Posts through the Slack Web API; a user id as target opens a DM
pub struct SlackNotifier {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl SlackNotifier {
    pub fn new(api_url: &str, token: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn post(&self, target: &str, text: &str) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(format!("{}/chat.postMessage", self.api_url))
            .bearer_auth(&self.token)
            .json(&PostMessage {
                channel: target,
                text,
            })
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Transport(format!("HTTP {}", status)));
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        if !body.ok {
            return Err(NotifyError::Rejected(
                body.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        debug!(recipient = %target, "Message posted");
        Ok(())
    }
}

/// Writes messages to the log instead of a chat platform
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn post(&self, target: &str, text: &str) -> Result<(), NotifyError> {
        info!(recipient = %target, "{}", text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn chat_post(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer xoxb-test");
        if !authorized {
            return Json(json!({"ok": false, "error": "invalid_auth"}));
        }
        if body["channel"] == "missing" {
            return Json(json!({"ok": false, "error": "channel_not_found"}));
        }
        Json(json!({"ok": true}))
    }

    #[tokio::test]
    async fn test_slack_post() {
        let url = serve(Router::new().route("/chat.postMessage", post(chat_post))).await;

        let notifier = SlackNotifier::new(&url, "xoxb-test").unwrap();
        notifier.post("U1", "hello").await.unwrap();

        let err = notifier.post("missing", "hello").await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(ref e) if e == "channel_not_found"));

        let bad = SlackNotifier::new(&url, "xoxb-wrong").unwrap();
        assert!(matches!(
            bad.post("U1", "hello").await,
            Err(NotifyError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_slack_transport_failure() {
        let notifier = SlackNotifier::new("http://127.0.0.1:9", "xoxb-test").unwrap();
        assert!(matches!(
            notifier.post("U1", "hello").await,
            Err(NotifyError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_log_notifier() {
        assert!(LogNotifier.post("general", "hi").await.is_ok());
    }
}
