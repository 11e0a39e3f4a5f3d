//! Request and response bodies for the transfer endpoints.

use serde::{Deserialize, Serialize};
use sitesync_core::config::ConnectionRequest;
use sitesync_core::files::FetchedFile;
use sitesync_core::sync::PublishReport;

/// Body of `PUT /api/ftp`: connection fields plus the files to write.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishRequest {
    #[serde(flatten)]
    pub connection: ConnectionRequest,
    #[serde(default)]
    pub files: Option<Vec<FetchedFile>>,
}

#[derive(Debug, Serialize)]
pub struct FetchResponse {
    pub ok: bool,
    pub files: Vec<FetchedFile>,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub report: PublishReport,
}

impl PublishResponse {
    pub fn from_report(report: PublishReport) -> Self {
        let error = if report.is_complete() {
            None
        } else {
            let total = report.uploaded.len() + report.failed.len();
            Some(format!(
                "{} of {} files failed to upload",
                report.failed.len(),
                total
            ))
        };
        Self {
            ok: error.is_none(),
            error,
            report,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub version: &'static str,
}
