//! Writes an in-memory file set back to a remote tree.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::FailurePolicy;
use crate::errors::SyncError;
use crate::files::path::{parent_dir, publish_target, validate_relative_name};
use crate::files::FetchedFile;
use crate::remote::{DirectoryStatus, DirectoryStep, RemoteFs};

/// A file that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub name: String,
    pub error: String,
}

/// What a publish did, file by file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    /// Names of files written, in input order.
    pub uploaded: Vec<String>,
    pub failed: Vec<FileFailure>,
    /// Every ancestor directory examined, in the order it was examined.
    pub directories: Vec<DirectoryStep>,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Directory steps that failed to be created.
    pub fn failed_directories(&self) -> impl Iterator<Item = &DirectoryStep> {
        self.directories
            .iter()
            .filter(|s| matches!(s.status, DirectoryStatus::Failed(_)))
    }
}

/// Reject batches that cannot be published before any connection is made.
pub fn validate_batch(files: &[FetchedFile]) -> Result<(), SyncError> {
    if files.is_empty() {
        return Err(SyncError::Input("files required".to_string()));
    }
    for file in files {
        validate_relative_name(&file.name).map_err(SyncError::Input)?;
    }
    Ok(())
}

/// Upload `files` under `base`, creating missing directories first.
///
/// Each distinct target directory is ensured once per call. With
/// [`FailurePolicy::Abort`] the first upload error ends the batch; with
/// [`FailurePolicy::Continue`] it is recorded in the report.
pub fn publish(
    fs: &mut dyn RemoteFs,
    base: &str,
    files: &[FetchedFile],
    policy: FailurePolicy,
) -> Result<PublishReport, SyncError> {
    let mut report = PublishReport::default();
    let mut ensured: HashSet<String> = HashSet::new();

    for file in files {
        let target = publish_target(base, &file.name);
        let dir = parent_dir(&target);

        if !ensured.contains(dir) {
            let steps = fs.ensure_directory_chain(dir);
            for step in &steps {
                if let DirectoryStatus::Failed(e) = &step.status {
                    warn!("Could not create {}: {}", step.path, e);
                }
            }
            report.directories.extend(steps);
            ensured.insert(dir.to_string());
        }

        match fs.upload(&target, file.content.as_bytes()) {
            Ok(()) => {
                debug!("Uploaded {target}");
                report.uploaded.push(file.name.clone());
            }
            Err(source) => match policy {
                FailurePolicy::Abort => {
                    return Err(SyncError::PublishAborted {
                        name: file.name.clone(),
                        source,
                    });
                }
                FailurePolicy::Continue => {
                    warn!("Upload of {target} failed: {source}");
                    report.failed.push(FileFailure {
                        name: file.name.clone(),
                        error: source.to_string(),
                    });
                }
            },
        }
    }

    Ok(report)
}
