//! Virtual-host templates
//!
//! Placeholders are written `{{name}}`; the Go-style `{{ .name }}` form is
//! accepted as well so existing template files keep working.

use chrono::Utc;
use devhelper_core::{Domain, ReconcileError};

/// Variables available to a template
pub const VARIABLES: [&str; 5] = ["ip", "domain", "basicauth", "scheme", "port"];

pub const NGINX_TEMPLATE: &str = r#"server {
    listen 80;
    server_name {{domain}};

    location / {
        auth_basic "{{basicauth}}";
        auth_basic_user_file /etc/nginx/.htpasswd;

        proxy_pass {{scheme}}://{{ip}}:{{port}};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }
}
"#;

/// Expects `(auth_Restricted)` and `(auth_off)` snippets in the main Caddyfile
pub const CADDY_TEMPLATE: &str = r#"{{domain}} {
    import auth_{{basicauth}}
    reverse_proxy {{scheme}}://{{ip}}:{{port}}
}
"#;

/// Render `template` for `domain`
///
/// The port is normalized to the scheme default first, so the rendered
/// upstream always agrees with `full_ssl`.
pub fn render(template: &str, domain: &Domain) -> Result<String, ReconcileError> {
    let mut domain = domain.clone();
    domain.normalize_port();

    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| ReconcileError::Template("unterminated placeholder".to_string()))?;
        let name = after[..end].trim().trim_start_matches('.');
        out.push_str(&lookup(name, &domain)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Check that a template only uses known placeholders
pub fn validate(template: &str) -> Result<(), ReconcileError> {
    let now = Utc::now();
    let probe = Domain {
        fqdn: "probe.invalid".to_string(),
        ip: "10.0.0.1".to_string(),
        owner_id: String::new(),
        owner_name: String::new(),
        created_at: now,
        delete_at: now,
        basic_auth: true,
        full_ssl: false,
        port: String::new(),
    };
    render(template, &probe).map(|_| ())
}

fn lookup(name: &str, domain: &Domain) -> Result<String, ReconcileError> {
    let value = match name {
        "ip" => domain.ip.clone(),
        "domain" => domain.fqdn.clone(),
        "basicauth" => domain.basic_auth_mode().to_string(),
        "scheme" => domain.scheme().to_string(),
        "port" => domain.port.clone(),
        other => {
            return Err(ReconcileError::Template(format!(
                "unknown placeholder '{}', expected one of {}",
                other,
                VARIABLES.join(", ")
            )))
        }
    };
    Ok(value)
}
