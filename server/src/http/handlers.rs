use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use sitesync_core::config::{ConnectionRequest, Credentials};
use sitesync_core::errors::SyncError;
use sitesync_core::sync::{fetch_tree, publish_tree};
use tracing::{info, info_span, Instrument, Span};
use uuid::Uuid;

use super::errors::ApiError;
use super::messages::{FetchResponse, HealthResponse, PublishRequest, PublishResponse};
use super::AppState;

/// Run blocking transfer work off the async executor, keeping the caller's
/// tracing span.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, SyncError> + Send + 'static,
    T: Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        work()
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Transfer task failed: {e}")))?
    .map_err(ApiError::from)
}

/// Decode a JSON body whatever `Content-Type` the client sent.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}

/// `POST /api/ftp`: fetch the remote tree.
pub async fn fetch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<FetchResponse>, ApiError> {
    let span = info_span!("fetch", request_id = %Uuid::new_v4());
    handle_fetch(state, body).instrument(span).await
}

async fn handle_fetch(
    state: AppState,
    body: Bytes,
) -> Result<Json<FetchResponse>, ApiError> {
    info!("Incoming fetch request");
    let request: ConnectionRequest = parse_body(&body)?;
    let credentials = Credentials::resolve(&request)?;
    info!("Credentials parsed: {}", credentials.log_summary());

    let connector = state.connector.clone();
    let options = state.config.fetch_options();
    let limits = state.config.walk_limits();
    let files = run_blocking(move || {
        fetch_tree(connector.as_ref(), &credentials, &options, &limits)
    })
    .await?;

    Ok(Json(FetchResponse { ok: true, files }))
}

/// `PUT /api/ftp`: publish files to the remote tree.
///
/// A batch with failed files still answers with the full report, under 500.
pub async fn publish(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let span = info_span!("publish", request_id = %Uuid::new_v4());
    handle_publish(state, body).instrument(span).await
}

async fn handle_publish(
    state: AppState,
    body: Bytes,
) -> Result<Response, ApiError> {
    info!("Incoming publish request");
    let request: PublishRequest = parse_body(&body)?;
    let credentials = Credentials::resolve(&request.connection)?;
    let files = request.files.unwrap_or_default();
    info!(
        "Upload parsed: {} files={}",
        credentials.log_summary(),
        files.len()
    );

    let connector = state.connector.clone();
    let options = state.config.publish_options();
    let report = run_blocking(move || {
        publish_tree(connector.as_ref(), &credentials, &files, &options)
    })
    .await?;

    let response = PublishResponse::from_report(report);
    let status = if response.ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(response)).into_response())
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}
