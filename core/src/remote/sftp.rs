//! SFTP adapter over a dedicated blocking `ssh2` session.
//!
//! Unlike FTP there is no "change into or create" primitive, so
//! [`SftpFs::ensure_directory_chain()`] stats each prefix and creates the
//! ones that are missing, carrying on past failures.

use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use ssh2::{ErrorCode, FileStat, FileType, Session, Sftp};
use tracing::debug;

use crate::config::{Credentials, Protocol};
use crate::errors::{FileError, SyncError};
use crate::files::path::{ancestor_chain, join_remote};
use crate::files::{EntryKind, RemoteEntry};

use super::{connect_tcp, DirectoryStatus, DirectoryStep, RemoteFs};

/// SFTP status codes from draft-ietf-secsh-filexfer.
const SSH_FX_NO_SUCH_FILE: i32 = 2;
const SSH_FX_PERMISSION_DENIED: i32 = 3;

/// Mode for directories created while publishing.
const DIR_MODE: i32 = 0o755;

/// An authenticated SSH session with the SFTP subsystem open.
pub struct SftpFs {
    session: Session,
    sftp: Option<Sftp>,
}

impl SftpFs {
    /// Connect, handshake and authenticate with the password.
    ///
    /// `timeout` bounds the TCP connect and every blocking libssh2 call
    /// during the handshake.
    pub fn connect(credentials: &Credentials, timeout: Duration) -> Result<Self, SyncError> {
        let tcp = connect_tcp(credentials, timeout)?;

        let mut session = Session::new()
            .map_err(|e| SyncError::Connection(format!("Failed to create SSH session: {e}")))?;
        session.set_tcp_stream(tcp);
        session.set_blocking(true);
        session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        session
            .handshake()
            .map_err(|e| SyncError::Connection(format!("SSH handshake failed: {e}")))?;

        session
            .userauth_password(&credentials.username, &credentials.password)
            .map_err(|e| SyncError::Connection(format!("SSH password auth failed: {e}")))?;
        if !session.authenticated() {
            return Err(SyncError::Connection(
                "SSH authentication failed".to_string(),
            ));
        }

        // Handshake is done; transfers of large files may legitimately take
        // longer than the connect budget.
        session.set_timeout(0);

        let sftp = session
            .sftp()
            .map_err(|e| SyncError::Connection(format!("Failed to open SFTP session: {e}")))?;

        debug!("SFTP connected to {}", credentials.address());
        Ok(Self {
            session,
            sftp: Some(sftp),
        })
    }

    fn sftp(&self) -> Result<&Sftp, FileError> {
        self.sftp
            .as_ref()
            .ok_or_else(|| FileError::OperationFailed("SFTP session is closed".to_string()))
    }
}

fn map_ssh_error(e: ssh2::Error, path: &str) -> FileError {
    match e.code() {
        ErrorCode::SFTP(SSH_FX_NO_SUCH_FILE) => FileError::NotFound(path.to_string()),
        ErrorCode::SFTP(SSH_FX_PERMISSION_DENIED) => FileError::PermissionDenied(path.to_string()),
        _ => FileError::OperationFailed(format!("{path}: {e}")),
    }
}

fn classify(stat: &FileStat) -> EntryKind {
    match stat.file_type() {
        FileType::Directory => EntryKind::Directory,
        FileType::RegularFile => EntryKind::File,
        FileType::Symlink => EntryKind::Symlink,
        _ => EntryKind::Other,
    }
}

impl RemoteFs for SftpFs {
    fn protocol(&self) -> Protocol {
        Protocol::Sftp
    }

    fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>, FileError> {
        let entries = self
            .sftp()?
            .readdir(Path::new(dir))
            .map_err(|e| map_ssh_error(e, dir))?;

        let mut result = Vec::with_capacity(entries.len());
        for (pathbuf, stat) in entries {
            let name = pathbuf
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            if name.is_empty() || name == "." || name == ".." {
                continue;
            }

            result.push(RemoteEntry {
                full_path: join_remote(dir, &name),
                name,
                kind: classify(&stat),
            });
        }
        Ok(result)
    }

    fn download(&mut self, path: &str) -> Result<Vec<u8>, FileError> {
        let mut file = self
            .sftp()?
            .open(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    fn upload(&mut self, path: &str, data: &[u8]) -> Result<(), FileError> {
        let mut file = self
            .sftp()?
            .create(Path::new(path))
            .map_err(|e| map_ssh_error(e, path))?;
        file.write_all(data)?;
        Ok(())
    }

    fn ensure_directory_chain(&mut self, dir: &str) -> Vec<DirectoryStep> {
        let sftp = match self.sftp() {
            Ok(sftp) => sftp,
            Err(e) => return vec![DirectoryStep::new(dir, DirectoryStatus::Failed(e.to_string()))],
        };

        ancestor_chain(dir)
            .into_iter()
            .map(|prefix| {
                let p = Path::new(&prefix);
                // A failed stat is treated as "missing"; mkdir decides.
                let status = if sftp.stat(p).is_ok() {
                    DirectoryStatus::Existed
                } else {
                    match sftp.mkdir(p, DIR_MODE) {
                        Ok(()) => DirectoryStatus::Created,
                        Err(e) => DirectoryStatus::Failed(e.to_string()),
                    }
                };
                DirectoryStep::new(prefix, status)
            })
            .collect()
    }

    fn disconnect(&mut self) -> Result<(), FileError> {
        // The SFTP channel must be closed before the session it belongs to.
        drop(self.sftp.take());
        self.session
            .disconnect(None, "closing", None)
            .map_err(|e| FileError::OperationFailed(format!("SSH disconnect failed: {e}")))
    }
}
