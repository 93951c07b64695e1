//! Shared-secret authentication for the command endpoint
//!
//! The chat gateway presents `Authorization: Bearer <token>`. When no token
//! is configured every request is accepted.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::models::ErrorResponse;

#[derive(Clone, Default)]
pub struct TokenState {
    pub token: Option<String>,
}

impl TokenState {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

fn unauthorized(error: &str, code: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: error.to_string(),
            code: Some(code.to_string()),
        }),
    )
}

pub async fn require_token(
    State(state): State<Arc<TokenState>>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let Some(expected) = state.token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("Missing Authorization header", "MISSING_AUTH"))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| {
            unauthorized(
                "Invalid Authorization header format. Expected 'Bearer <token>'",
                "INVALID_AUTH_FORMAT",
            )
        })?;

    if !tokens_match(presented, expected) {
        return Err(unauthorized("Invalid token", "INVALID_TOKEN"));
    }
    Ok(next.run(request).await)
}

/// Constant-time comparison; only the length difference is observable
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (presented, expected) = (presented.as_bytes(), expected.as_bytes());
    presented.len() == expected.len() && presented.ct_eq(expected).into()
}
