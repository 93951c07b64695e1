//! Text command grammar

use regex_lite::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static MAILTO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<mailto:(.*?)\|(.*?)>").expect("static pattern"));

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<@[A-Za-z0-9]+>$").expect("static pattern"));

pub const HELP_TEXT: &str = "\
Available commands:
• `create <ip>` (or `domain create <ip>`): create a domain for the IP
• `update [<param> [<value>]]`: params: expire (no value), ip <ip>, basic-auth true|false, full-ssl true|false, port <port>
• `delete`: delete the domain assigned to you
• `vpn get`: get your personal VPN profile link
• `vpn eu <hours>`: enable your VPN account for a limited time
• `vpn create <login> <email>`: [ADMIN] create a VPN profile
• `vpn delete <email>`: [ADMIN] delete a VPN profile";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DomainCreate { ip: String },
    /// Empty `param` means renew
    DomainUpdate { param: String, value: String },
    DomainDelete,
    VpnGet,
    VpnCreate { login: String, email: String },
    VpnDelete { email: String },
    /// Duration-bound session
    VpnTimed { hours: u32 },
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command '{0}'")]
    Unknown(String),

    #[error("Not enough arguments, expected {0}")]
    MissingArgument(&'static str),

    #[error("Invalid number of hours '{0}'")]
    InvalidHours(String),
}

impl Command {
    /// Parse a chat message; leading bot mentions are ignored
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let tokens: Vec<&str> = text
            .split_whitespace()
            .skip_while(|t| MENTION.is_match(t))
            .collect();
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_ascii_lowercase()).collect();
        let words: Vec<&str> = lowered.iter().map(String::as_str).collect();

        let (words, args) = match words.first() {
            Some(&"domain") => (&words[1..], &tokens[1..]),
            _ => (&words[..], &tokens[..]),
        };

        match words {
            [] => Err(ParseError::Empty),
            ["help", ..] => Ok(Command::Help),
            ["create"] => Err(ParseError::MissingArgument("<ip>")),
            ["create", ..] => Ok(Command::DomainCreate {
                ip: args[1].to_string(),
            }),
            ["update", ..] => Ok(Command::DomainUpdate {
                param: args.get(1).map(|p| p.to_ascii_lowercase()).unwrap_or_default(),
                value: args.get(2).map(|v| v.to_string()).unwrap_or_default(),
            }),
            ["delete", ..] => Ok(Command::DomainDelete),
            ["vpn", "get", ..] => Ok(Command::VpnGet),
            ["vpn", "create", ..] => match (args.get(2), args.get(3)) {
                (Some(login), Some(email)) => Ok(Command::VpnCreate {
                    login: login.to_string(),
                    email: unwrap_email(email),
                }),
                _ => Err(ParseError::MissingArgument("<login> <email>")),
            },
            ["vpn", "delete", ..] => match args.get(2) {
                Some(email) => Ok(Command::VpnDelete {
                    email: unwrap_email(email),
                }),
                None => Err(ParseError::MissingArgument("<email>")),
            },
            ["vpn", "eu", ..] => {
                let raw = args.get(2).ok_or(ParseError::MissingArgument("<hours>"))?;
                let hours = raw
                    .trim_end_matches(['h', 'H'])
                    .parse::<u32>()
                    .map_err(|_| ParseError::InvalidHours(raw.to_string()))?;
                Ok(Command::VpnTimed { hours })
            }
            [first, ..] => Err(ParseError::Unknown(first.to_string())),
        }
    }

    /// Whether the command is restricted to administrators
    pub fn is_privileged(&self) -> bool {
        matches!(self, Command::VpnCreate { .. } | Command::VpnDelete { .. })
    }
}

/// Extract the address from Slack's `<mailto:a@b|a@b>` markup
pub fn unwrap_email(raw: &str) -> String {
    match MAILTO.captures(raw) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        None => raw.trim().to_string(),
    }
}
