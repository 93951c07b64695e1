use axum::{extract::State, Json};
use std::sync::Arc;

use crate::models::{CommandRequest, CommandResponse, HealthResponse};
use crate::AppState;

/// Run one chat command
pub async fn run_command(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommandRequest>,
) -> Json<CommandResponse> {
    let reply = state.dispatcher.dispatch(&request).await;
    Json(CommandResponse::new(reply.text, reply.error))
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        vpn_enabled: state.vpn_enabled,
    })
}
