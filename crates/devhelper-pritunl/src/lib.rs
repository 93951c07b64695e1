//! Pritunl account server client
//!
//! Every request carries the HMAC authentication headers produced by
//! [`signature::sign`]. All user operations are scoped to the organization
//! named in [`PritunlConfig::organization`], which is resolved by name on
//! each call.

pub mod signature;
pub mod types;

use async_trait::async_trait;
use devhelper_core::{AccountApi, AccountError, RemoteUser};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use types::{Key, NewUser, Organization, User};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PritunlConfig {
    /// Base URL, e.g. `https://vpn.corp.example`
    pub host: String,
    pub token: String,
    pub secret: String,
    pub organization: String,
    pub request_timeout: Duration,
}

pub struct PritunlClient {
    config: PritunlConfig,
    http: reqwest::Client,
}

impl PritunlClient {
    pub fn new(mut config: PritunlConfig) -> Result<Self, AccountError> {
        config.host = config.host.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AccountError::Transport(e.to_string()))?;

        info!(host = %config.host, organization = %config.organization, "Pritunl client ready");
        Ok(Self { config, http })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<String, AccountError> {
        let now = chrono::Utc::now().timestamp();
        let auth = signature::sign(
            &self.config.token,
            &self.config.secret,
            now,
            &signature::nonce(),
            method.as_str(),
            path,
        )
        .map_err(|e| AccountError::Transport(format!("cannot sign request: {}", e)))?;

        let mut request = self
            .http
            .request(method.clone(), format!("{}{}", self.config.host, path))
            .header("Auth-Token", auth.token)
            .header("Auth-Timestamp", auth.timestamp)
            .header("Auth-Nonce", auth.nonce)
            .header("Auth-Signature", auth.signature)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AccountError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AccountError::Transport(e.to_string()))?;

        debug!(method = %method, path = %path, status = status.as_u16(), "Pritunl request");
        if status.as_u16() >= 400 {
            return Err(AccountError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<T, AccountError> {
        let text = self.send(method, path, body).await?;
        serde_json::from_str(&text).map_err(|e| AccountError::Decode(format!("{}: {}", path, e)))
    }

    /// Resolve the configured organization by name
    pub async fn organization(&self) -> Result<Organization, AccountError> {
        let organizations: Vec<Organization> = self.call(Method::GET, "/organization", None).await?;
        organizations
            .into_iter()
            .find(|o| o.name == self.config.organization)
            .ok_or_else(|| AccountError::OrganizationNotFound(self.config.organization.clone()))
    }

    pub async fn list_users(&self, org_id: &str) -> Result<Vec<User>, AccountError> {
        self.call(Method::GET, &format!("/user/{}", org_id), None)
            .await
    }

    pub async fn user_by_email(&self, org_id: &str, email: &str) -> Result<Option<User>, AccountError> {
        Ok(self
            .list_users(org_id)
            .await?
            .into_iter()
            .find(|u| u.email == email))
    }

    pub async fn user_by_name(&self, org_id: &str, name: &str) -> Result<Option<User>, AccountError> {
        Ok(self
            .list_users(org_id)
            .await?
            .into_iter()
            .find(|u| u.name == name))
    }

    async fn require_user(&self, org_id: &str, email: &str) -> Result<User, AccountError> {
        self.user_by_email(org_id, email)
            .await?
            .ok_or_else(|| AccountError::UserNotFound(email.to_string()))
    }

    /// Create a user, refusing an email or name that is already taken
    pub async fn create_user_in(
        &self,
        org_id: &str,
        name: &str,
        email: &str,
    ) -> Result<User, AccountError> {
        let users = self.list_users(org_id).await?;
        if users.iter().any(|u| u.email == email) {
            return Err(AccountError::UserExists(email.to_string()));
        }
        if users.iter().any(|u| u.name == name) {
            return Err(AccountError::UserExists(name.to_string()));
        }

        let body = NewUser {
            name,
            email,
            organization: org_id,
        };
        let created: Vec<User> = self
            .call(Method::POST, &format!("/user/{}", org_id), Some(json_body(&body)?))
            .await?;
        let user = created
            .into_iter()
            .next()
            .ok_or_else(|| AccountError::Decode("empty response to user creation".to_string()))?;

        info!(email = %email, name = %name, "Created remote user");
        Ok(user)
    }

    pub async fn update_user(&self, org_id: &str, user: &User) -> Result<User, AccountError> {
        self.call(
            Method::PUT,
            &format!("/user/{}/{}", org_id, user.id),
            Some(json_body(user)?),
        )
        .await
    }

    pub async fn delete_user_by_id(&self, org_id: &str, user_id: &str) -> Result<(), AccountError> {
        self.send(Method::DELETE, &format!("/user/{}/{}", org_id, user_id), None)
            .await?;
        Ok(())
    }

    pub async fn user_key(&self, org_id: &str, user_id: &str) -> Result<Key, AccountError> {
        self.call(Method::GET, &format!("/key/{}/{}", org_id, user_id), None)
            .await
    }
}

#[async_trait]
impl AccountApi for PritunlClient {
    async fn find_user(&self, email: &str) -> Result<Option<RemoteUser>, AccountError> {
        let org = self.organization().await?;
        Ok(self.user_by_email(&org.id, email).await?.map(RemoteUser::from))
    }

    async fn create_user(&self, name: &str, email: &str) -> Result<RemoteUser, AccountError> {
        let org = self.organization().await?;
        Ok(self.create_user_in(&org.id, name, email).await?.into())
    }

    async fn delete_user(&self, email: &str) -> Result<(), AccountError> {
        let org = self.organization().await?;
        let user = self.require_user(&org.id, email).await?;
        self.delete_user_by_id(&org.id, &user.id).await?;

        info!(email = %email, "Deleted remote user");
        Ok(())
    }

    async fn set_user_disabled(&self, email: &str, disabled: bool) -> Result<(), AccountError> {
        let org = self.organization().await?;
        let mut user = self.require_user(&org.id, email).await?;
        if user.disabled == disabled {
            return Ok(());
        }
        user.disabled = disabled;
        self.update_user(&org.id, &user).await?;

        info!(email = %email, disabled, "Updated remote user");
        Ok(())
    }

    async fn config_url(&self, email: &str) -> Result<String, AccountError> {
        let org = self.organization().await?;
        let user = self.require_user(&org.id, email).await?;
        let key = self.user_key(&org.id, &user.id).await?;
        Ok(format!("{}{}", self.config.host, key.key_zip_url))
    }
}

fn json_body<T: Serialize>(value: &T) -> Result<String, AccountError> {
    serde_json::to_string(value).map_err(|e| AccountError::Decode(e.to_string()))
}
