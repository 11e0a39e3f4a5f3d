use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sitesync_core::errors::SyncError;
use thiserror::Error;
use tracing::error;

use super::messages::ErrorResponse;

/// Errors returned by the HTTP handlers.
///
/// Rendered as `{ "ok": false, "error": "..." }` with 400 for bad input and
/// 500 for everything else.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Sync(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Sync(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!("Request failed: {message}");
        }
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
