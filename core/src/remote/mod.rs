//! Protocol adapters for remote file trees.
//!
//! [`RemoteFs`] is the single operation set the walker and publisher use.
//! FTP and SFTP differ in how they list entries and create directories;
//! those differences stay inside the adapter implementations.
//!
//! Connections are opened through a [`Connector`] and wrapped in a
//! [`Connection`] guard that disconnects on drop, so every exit path of an
//! operation releases the socket.

#[cfg(feature = "ftp")]
pub mod ftp;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
#[cfg(feature = "sftp")]
pub mod sftp;

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::config::{Credentials, Protocol};
use crate::errors::{FileError, SyncError};
use crate::files::RemoteEntry;

/// Outcome of making sure one directory exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryStatus {
    Existed,
    Created,
    Failed(String),
}

/// One ancestor directory visited by [`RemoteFs::ensure_directory_chain()`].
///
/// Serialized as `{ "path", "status" }` plus `"error"` for failed steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryStep {
    pub path: String,
    pub status: DirectoryStatus,
}

impl Serialize for DirectoryStep {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let (status, error) = match &self.status {
            DirectoryStatus::Existed => ("existed", None),
            DirectoryStatus::Created => ("created", None),
            DirectoryStatus::Failed(e) => ("failed", Some(e)),
        };
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("path", &self.path)?;
        map.serialize_entry("status", status)?;
        if let Some(error) = error {
            map.serialize_entry("error", error)?;
        }
        map.end()
    }
}

impl DirectoryStep {
    pub fn new(path: impl Into<String>, status: DirectoryStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

/// Uniform file operations over a connected FTP or SFTP session.
///
/// Implementations are used from a single thread for the lifetime of one
/// request and are never shared.
pub trait RemoteFs {
    fn protocol(&self) -> Protocol;

    /// List a directory, excluding `.` and `..`.
    fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>, FileError>;

    /// Read a whole file into memory.
    fn download(&mut self, path: &str) -> Result<Vec<u8>, FileError>;

    /// Create or overwrite a file.
    fn upload(&mut self, path: &str, data: &[u8]) -> Result<(), FileError>;

    /// Make sure every ancestor of `dir` (and `dir` itself) exists.
    ///
    /// Returns one step per segment that was examined. Failures are reported
    /// in the steps rather than as an error; a later upload into the
    /// directory surfaces any real problem.
    fn ensure_directory_chain(&mut self, dir: &str) -> Vec<DirectoryStep>;

    /// Close the session. Called at most once.
    fn disconnect(&mut self) -> Result<(), FileError>;
}

/// Owns a connected adapter and disconnects it when dropped.
pub struct Connection {
    fs: Box<dyn RemoteFs>,
    closed: bool,
}

impl Connection {
    pub fn new(fs: Box<dyn RemoteFs>) -> Self {
        Self { fs, closed: false }
    }

    /// Disconnect explicitly, reporting the result.
    pub fn close(mut self) -> Result<(), FileError> {
        self.closed = true;
        self.fs.disconnect()
    }
}

impl Deref for Connection {
    type Target = dyn RemoteFs;

    fn deref(&self) -> &Self::Target {
        self.fs.as_ref()
    }
}

impl DerefMut for Connection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.fs.as_mut()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.fs.disconnect() {
            debug!("{} disconnect failed: {}", self.fs.protocol(), e);
        }
    }
}

/// Opens connections for fetch and publish operations.
pub trait Connector: Send + Sync {
    fn connect(&self, credentials: &Credentials, timeout: Duration)
        -> Result<Connection, SyncError>;
}

/// Connects to real hosts over the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkConnector;

impl Connector for NetworkConnector {
    fn connect(
        &self,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Connection, SyncError> {
        match credentials.protocol {
            #[cfg(feature = "ftp")]
            Protocol::Ftp => Ok(Connection::new(Box::new(ftp::FtpFs::connect(
                credentials,
                timeout,
            )?))),
            #[cfg(feature = "sftp")]
            Protocol::Sftp => Ok(Connection::new(Box::new(sftp::SftpFs::connect(
                credentials,
                timeout,
            )?))),
            #[allow(unreachable_patterns)]
            other => {
                let _ = timeout;
                Err(SyncError::Unsupported(other))
            }
        }
    }
}

/// Open a TCP connection to `host:port`, trying each resolved address in
/// turn until one answers.
///
/// `timeout` is the budget for the whole attempt, not for each address.
#[cfg(any(feature = "ftp", feature = "sftp"))]
pub(crate) fn connect_tcp(
    credentials: &Credentials,
    timeout: Duration,
) -> Result<std::net::TcpStream, SyncError> {
    use std::net::{TcpStream, ToSocketAddrs};
    use std::time::Instant;

    let addr = credentials.address();
    let connect_error = |e: &dyn std::fmt::Display| {
        SyncError::Connection(format!(
            "{} connection to {addr} failed: {e}",
            credentials.protocol
        ))
    };

    let candidates = addr
        .to_socket_addrs()
        .map_err(|e| SyncError::Connection(format!("Failed to resolve {addr}: {e}")))?;
    let deadline = Instant::now() + timeout;
    let mut last_error = None;
    for candidate in candidates {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match TcpStream::connect_timeout(&candidate, remaining) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {candidate} failed: {e}");
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) => connect_error(&e),
        None => connect_error(&"no reachable address"),
    })
}
