//! Error types for the sitesync core crate.
//!
//! [`FileError`] covers failures scoped to a single remote path. The walker
//! swallows these per file; the publisher records or propagates them
//! depending on the configured policy. [`SyncError`] covers failures that end
//! a whole fetch or publish operation. The server maps `SyncError::Input` to
//! a client error and everything else to a server error.

use thiserror::Error;

use crate::config::Protocol;

/// Errors scoped to a single remote file or directory.
#[derive(Error, Debug)]
pub enum FileError {
    /// The requested file or directory was not found.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Permission was denied for the requested operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A transfer or filesystem command failed on the remote side.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// Downloaded bytes were not valid UTF-8.
    #[error("Not valid UTF-8 text: {0}")]
    Decode(String),

    /// A low-level I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort a fetch or publish operation.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The request was missing a field or carried an invalid value.
    #[error("{0}")]
    Input(String),

    /// Resolving, connecting, handshaking or authenticating failed.
    #[error("{0}")]
    Connection(String),

    /// A directory listing failed while walking the remote tree.
    #[error("Failed to list {path}: {source}")]
    Listing {
        path: String,
        #[source]
        source: FileError,
    },

    /// An upload failed and the publish policy is to abort the batch.
    #[error("Upload of {name} failed: {source}")]
    PublishAborted {
        name: String,
        #[source]
        source: FileError,
    },

    /// Support for the protocol was not compiled into this build.
    #[error("{0} support is not available in this build")]
    Unsupported(Protocol),
}

impl SyncError {
    /// Whether the failure was caused by the caller's input rather than the
    /// remote side.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Input(_))
    }
}
