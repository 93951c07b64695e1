//! Command dispatcher and HTTP surface
//!
//! A chat gateway relays messages to `POST /api/commands`; the
//! [`Dispatcher`] parses them, runs them against the lifecycle managers and
//! answers with the text to post back.

pub mod command;
pub mod dispatcher;
pub mod handlers;
pub mod middleware;
pub mod models;

pub use command::{unwrap_email, Command, ParseError};
pub use dispatcher::{Dispatcher, Reply};

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub vpn_enabled: bool,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Upper bound on handling one request
    pub request_timeout: Duration,
    /// Bearer token required on the command endpoint, if set
    pub token: Option<String>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            request_timeout: Duration::from_secs(30),
            token: None,
        }
    }
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, dispatcher: Arc<Dispatcher>, vpn_enabled: bool) -> Self {
        let state = Arc::new(AppState {
            dispatcher,
            vpn_enabled,
        });
        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let token_state = Arc::new(middleware::TokenState::new(self.config.token.clone()));

        let public_router = Router::new()
            .route("/health", get(handlers::health_check))
            .with_state(self.state.clone());

        let protected_router = Router::new()
            .route("/api/commands", post(handlers::run_command))
            .with_state(self.state.clone())
            .layer(axum_middleware::from_fn_with_state(
                token_state,
                middleware::require_token,
            ));

        public_router
            .merge(protected_router)
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `shutdown` is cancelled
    pub async fn start(self, shutdown: CancellationToken) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!("Starting API server on {}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        info!("API server stopped");
        Ok(())
    }
}
