//! Dashboard: Axum JSON API over the live scan results.
//!
//! CORS allows GET from any origin so a browser front end can poll it.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use routes::AppState;

/// Bind the dashboard port and serve in a background task.
///
/// Binding happens before returning so a taken port fails startup instead
/// of dying silently inside the task. Returns the bound address.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<SocketAddr> {
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    let local = listener
        .local_addr()
        .context("Failed to read dashboard listener address")?;
    info!(port = local.port(), "Dashboard server starting on http://localhost:{}", local.port());

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    });

    Ok(local)
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/intraday", get(routes::get_intraday))
        .route("/api/btst", get(routes::get_btst))
        .route("/api/market-status", get(routes::get_market_status))
        .route("/api/scanner", get(routes::get_scanner))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
