//! Fetch and publish operations.
//!
//! Each operation opens exactly one connection through a [`Connector`],
//! runs the walker or publisher sequentially over it and releases it on
//! every exit path. No state is kept between calls.

pub mod publisher;
pub mod walker;

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{Credentials, SyncOptions};
use crate::errors::SyncError;
use crate::files::{ExtensionFilter, FetchedFile};
use crate::remote::Connector;

pub use publisher::{FileFailure, PublishReport};
pub use walker::WalkLimits;

/// Number of fetched names logged at debug level after a fetch.
const LOGGED_NAMES: usize = 5;

/// Pull every matching text file under `credentials.base_path`.
pub fn fetch_tree(
    connector: &dyn Connector,
    credentials: &Credentials,
    options: &SyncOptions,
    limits: &WalkLimits,
) -> Result<Vec<FetchedFile>, SyncError> {
    info!("Fetching remote tree: {}", credentials.log_summary());
    let started = Instant::now();

    let mut conn = connector.connect(credentials, options.connect_timeout)?;
    let filter = ExtensionFilter::new(&options.extensions);
    let files = walker::walk(&mut *conn, &credentials.base_path, &filter, limits)?;
    if let Err(e) = conn.close() {
        debug!("Disconnect after fetch failed: {e}");
    }

    info!(
        "Fetch completed: {} files in {} ms",
        files.len(),
        started.elapsed().as_millis()
    );
    if !files.is_empty() {
        let first: Vec<&str> = files
            .iter()
            .take(LOGGED_NAMES)
            .map(|f| f.name.as_str())
            .collect();
        debug!("First fetched files: {first:?}");
    }
    Ok(files)
}

/// Write `files` under `credentials.base_path`.
///
/// The batch is validated before connecting: an empty list or a name that
/// could escape the base directory is an input error.
pub fn publish_tree(
    connector: &dyn Connector,
    credentials: &Credentials,
    files: &[FetchedFile],
    options: &SyncOptions,
) -> Result<PublishReport, SyncError> {
    publisher::validate_batch(files)?;

    info!(
        "Publishing {} files: {}",
        files.len(),
        credentials.log_summary()
    );
    let started = Instant::now();

    let mut conn = connector.connect(credentials, options.connect_timeout)?;
    let report = publisher::publish(
        &mut *conn,
        &credentials.base_path,
        files,
        options.failure_policy,
    )?;
    if let Err(e) = conn.close() {
        debug!("Disconnect after publish failed: {e}");
    }

    if report.is_complete() {
        info!(
            "Publish completed: {} files in {} ms",
            report.uploaded.len(),
            started.elapsed().as_millis()
        );
    } else {
        warn!(
            "Publish finished with {} of {} files failed in {} ms",
            report.failed.len(),
            files.len(),
            started.elapsed().as_millis()
        );
    }
    Ok(report)
}
