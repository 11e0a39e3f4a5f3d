//! HTTP transport endpoint.
//!
//! `POST /api/ftp` fetches a remote tree, `PUT /api/ftp` publishes files to
//! it. Each request opens and closes its own connection; the only state
//! shared between requests is the read-only config and connector.

mod errors;
mod handlers;
mod messages;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use sitesync_core::remote::{Connector, NetworkConnector};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;

/// Shared, read-only handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub connector: Arc<dyn Connector>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_connector(config, Arc::new(NetworkConnector))
    }

    pub fn with_connector(config: ServerConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;
    Router::new()
        .route("/api/ftp", post(handlers::fetch).put(handlers::publish))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!("Cannot listen for Ctrl-C, running until killed: {e}");
            std::future::pending::<()>().await;
        }
    }
}
