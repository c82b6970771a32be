//! Axum-based HTTP surface for the command router.
//!
//! Two endpoints mirror the conversational contract: `/ops/route` takes a
//! free-text operator turn, `/ops/confirm` resolves a pending decision.
//! Body limits and request timeouts follow the gateway hardening defaults.

mod handlers;

use crate::executor::ActionExecutor;
use crate::router::CommandRouter;
use anyhow::Result;
use axum::{
    Router,
    routing::{get, post},
};
use handlers::{handle_confirm, handle_health, handle_route};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) — prevents slow-loris attacks
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<CommandRouter>,
    pub executor: Arc<dyn ActionExecutor>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/ops/route", post(handle_route))
        .route("/ops/confirm", post(handle_confirm))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        // Operator consoles call from browser origins.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the task is cancelled.
pub async fn run_gateway(host: &str, port: u16, state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("opsgate gateway listening on http://{host}:{port}");

    axum::serve(listener, app(state)).await?;
    Ok(())
}
