//! Routes parsed commands to the lifecycle managers and renders replies

use crate::command::{Command, HELP_TEXT};
use crate::models::CommandRequest;
use chrono::FixedOffset;
use devhelper_core::{
    DomainManager, ErrorKind, LifecycleError, Notifier, SessionOutcome, VpnManager,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

const REPLY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Text returned to the requester
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    /// Set when the command failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl Reply {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: None,
        }
    }

    fn failed(action: &str, err: &LifecycleError) -> Self {
        let kind = err.kind();
        let text = match kind {
            ErrorKind::NotFound => format!("Nothing to do: {}.", err),
            ErrorKind::Validation | ErrorKind::Conflict => format!("Error {}. {}", action, err),
            ErrorKind::Reconciliation | ErrorKind::PartialBatch => {
                format!("Error {}. {}. Please contact admin.", action, err)
            }
        };
        Self {
            text,
            error: Some(kind),
        }
    }

    fn rejected(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: Some(ErrorKind::Validation),
        }
    }
}

pub struct Dispatcher {
    domains: Arc<DomainManager>,
    vpn: Option<Arc<VpnManager>>,
    notifier: Arc<dyn Notifier>,
    admins: HashSet<String>,
}

impl Dispatcher {
    pub fn new(
        domains: Arc<DomainManager>,
        vpn: Option<Arc<VpnManager>>,
        notifier: Arc<dyn Notifier>,
        admins: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            domains,
            vpn,
            notifier,
            admins: admins.into_iter().collect(),
        }
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.contains(user_id)
    }

    fn offset(&self) -> FixedOffset {
        self.domains.settings().utc_offset
    }

    pub async fn dispatch(&self, request: &CommandRequest) -> Reply {
        let command = match Command::parse(&request.text) {
            Ok(command) => command,
            Err(err) => {
                return Reply::rejected(format!("{}. Type `help` for the list of commands.", err))
            }
        };

        if command.is_privileged() && !self.is_admin(&request.user_id) {
            warn!(user_id = %request.user_id, text = %request.text, "Privileged command refused");
            return Reply::rejected("You are not allowed to run this command.");
        }

        let reply = match command {
            Command::Help => Reply::ok(HELP_TEXT),
            Command::DomainCreate { ip } => self.domain_create(request, &ip).await,
            Command::DomainUpdate { param, value } => {
                self.domain_update(request, &param, &value).await
            }
            Command::DomainDelete => self.domain_delete(request).await,
            Command::VpnGet => self.vpn_get(request).await,
            Command::VpnCreate { login, email } => self.vpn_create(&login, &email).await,
            Command::VpnDelete { email } => self.vpn_delete(&email).await,
            Command::VpnTimed { hours } => self.vpn_timed(request, hours).await,
        };

        match reply.error {
            Some(ErrorKind::Reconciliation) | Some(ErrorKind::PartialBatch) => error!(
                user_id = %request.user_id,
                text = %request.text,
                reply = %reply.text,
                "Command failed"
            ),
            Some(_) => info!(user_id = %request.user_id, text = %request.text, reply = %reply.text, "Command rejected"),
            None => info!(user_id = %request.user_id, text = %request.text, "Command handled"),
        }
        reply
    }

    async fn domain_create(&self, request: &CommandRequest, ip: &str) -> Reply {
        match self
            .domains
            .create(&request.user_id, &request.user_name, ip)
            .await
        {
            Ok(domain) => Reply::ok(format!(
                "Created domain {} with IP {}. Scheduled delete date: {}.",
                domain.fqdn,
                domain.ip,
                domain
                    .delete_at
                    .with_timezone(&self.offset())
                    .format(REPLY_TIME_FORMAT)
            )),
            Err(err) => Reply::failed("creating domain", &err),
        }
    }

    async fn domain_update(&self, request: &CommandRequest, param: &str, value: &str) -> Reply {
        match self.domains.update(&request.user_id, param, value).await {
            Ok(_) => Reply::ok("Updated"),
            Err(err) => Reply::failed("updating domain", &err),
        }
    }

    async fn domain_delete(&self, request: &CommandRequest) -> Reply {
        match self.domains.delete(&request.user_id).await {
            Ok(domain) => Reply::ok(format!("Deleted domain {}", domain.fqdn)),
            Err(err) => Reply::failed("deleting domain", &err),
        }
    }

    fn vpn(&self) -> Result<&Arc<VpnManager>, Reply> {
        self.vpn
            .as_ref()
            .ok_or_else(|| Reply::rejected("VPN is not configured."))
    }

    fn requester_email<'a>(&self, request: &'a CommandRequest) -> Result<&'a str, Reply> {
        match request.user_email.trim() {
            "" => Err(Reply::rejected(
                "Cannot resolve your email. Please contact admin.",
            )),
            email => Ok(email),
        }
    }

    /// Send `url` privately, then confirm in the reply
    async fn deliver_link(&self, request: &CommandRequest, url: &str, prefix: &str) -> Reply {
        match self.notifier.post(&request.user_id, url).await {
            Ok(()) => Reply::ok(format!(
                "{}Just sent the link in a private message.",
                prefix
            )),
            Err(err) => Reply::failed("sending the link", &LifecycleError::from(err)),
        }
    }

    async fn vpn_get(&self, request: &CommandRequest) -> Reply {
        let vpn = match self.vpn() {
            Ok(vpn) => vpn,
            Err(reply) => return reply,
        };
        let email = match self.requester_email(request) {
            Ok(email) => email,
            Err(reply) => return reply,
        };
        match vpn.get_config_url(email).await {
            Ok(url) => self.deliver_link(request, &url, "").await,
            Err(err) => Reply::failed("getting vpn config url", &err),
        }
    }

    async fn vpn_create(&self, login: &str, email: &str) -> Reply {
        let vpn = match self.vpn() {
            Ok(vpn) => vpn,
            Err(reply) => return reply,
        };
        match vpn.create_user(login, email).await {
            Ok(()) => Reply::ok("User created."),
            Err(err) => Reply::failed("creating vpn profile", &err),
        }
    }

    async fn vpn_delete(&self, email: &str) -> Reply {
        let vpn = match self.vpn() {
            Ok(vpn) => vpn,
            Err(reply) => return reply,
        };
        match vpn.delete_user(email).await {
            Ok(()) => Reply::ok("Deleted vpn profile."),
            Err(err) => Reply::failed("deleting vpn profile", &err),
        }
    }

    async fn vpn_timed(&self, request: &CommandRequest, hours: u32) -> Reply {
        let vpn = match self.vpn() {
            Ok(vpn) => vpn,
            Err(reply) => return reply,
        };
        let email = match self.requester_email(request) {
            Ok(email) => email,
            Err(reply) => return reply,
        };
        let session = match vpn
            .get_or_create_timed_session(&request.user_name, email, &request.user_id, hours)
            .await
        {
            Ok(session) => session,
            Err(err) => return Reply::failed("enabling vpn", &err),
        };

        let offset = self.offset();
        let until = |at: chrono::DateTime<chrono::Utc>| {
            at.with_timezone(&offset).format(REPLY_TIME_FORMAT).to_string()
        };
        let prefix = match session.outcome {
            SessionOutcome::Created { deactivate_at } => {
                format!("VPN account created, active until {}. ", until(deactivate_at))
            }
            SessionOutcome::Reactivated { deactivate_at } => {
                format!("VPN account enabled until {}. ", until(deactivate_at))
            }
            SessionOutcome::AlreadyActive { deactivate_at } => {
                format!("VPN account is already active until {}. ", until(deactivate_at))
            }
            SessionOutcome::Permanent => "Your VPN account is permanent. ".to_string(),
        };
        self.deliver_link(request, &session.config_url, &prefix).await
    }
}
