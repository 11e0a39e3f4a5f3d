//! Depth-first fetch of a remote tree into memory.
//!
//! The walk keeps an explicit stack of listing frames instead of recursing,
//! so hostile or very deep trees cannot exhaust the thread stack. Files are
//! emitted in the same order a recursive walk would produce: each directory
//! is descended into as soon as its entry is reached.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::errors::{FileError, SyncError};
use crate::files::path::{join_remote, normalize_dir, strip_leading_slashes};
use crate::files::{EntryKind, ExtensionFilter, FetchedFile, RemoteEntry};
use crate::remote::RemoteFs;

/// Limits applied while walking.
#[derive(Debug, Clone, Default)]
pub struct WalkLimits {
    /// Maximum directory depth below the start directory. `None` walks the
    /// whole tree.
    pub max_depth: Option<usize>,
}

struct Frame {
    dir: String,
    depth: usize,
    entries: std::vec::IntoIter<RemoteEntry>,
}

/// Fetch every regular file under `start` whose name passes `filter`.
///
/// Symlinks are never followed or downloaded. A file that cannot be
/// downloaded or decoded is skipped; a directory that cannot be listed
/// aborts the walk.
pub fn walk(
    fs: &mut dyn RemoteFs,
    start: &str,
    filter: &ExtensionFilter,
    limits: &WalkLimits,
) -> Result<Vec<FetchedFile>, SyncError> {
    let mut files = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = Vec::new();

    visited.insert(normalize_dir(start));
    stack.push(open_frame(fs, start, 0)?);

    while let Some(frame) = stack.last_mut() {
        let Some(entry) = frame.entries.next() else {
            stack.pop();
            continue;
        };
        let path = join_remote(&frame.dir, &entry.name);
        let depth = frame.depth;

        match entry.kind {
            EntryKind::Directory => {
                if limits.max_depth.is_some_and(|max| depth >= max) {
                    warn!("Not descending into {path}: depth limit reached");
                    continue;
                }
                if !visited.insert(normalize_dir(&path)) {
                    debug!("Skipping already visited directory {path}");
                    continue;
                }
                let child = open_frame(fs, &path, depth + 1)?;
                stack.push(child);
            }
            EntryKind::File => {
                if !filter.matches(&entry.name) {
                    continue;
                }
                match fetch_text(fs, &path) {
                    Ok(content) => files.push(FetchedFile {
                        name: strip_leading_slashes(&path).to_string(),
                        content,
                    }),
                    Err(e) => debug!("Skipping {path}: {e}"),
                }
            }
            EntryKind::Symlink | EntryKind::Other => {
                debug!("Skipping non-regular entry {path}");
            }
        }
    }

    Ok(files)
}

fn open_frame(fs: &mut dyn RemoteFs, dir: &str, depth: usize) -> Result<Frame, SyncError> {
    let entries = fs.list(dir).map_err(|source| SyncError::Listing {
        path: dir.to_string(),
        source,
    })?;
    Ok(Frame {
        dir: dir.to_string(),
        depth,
        entries: entries.into_iter(),
    })
}

fn fetch_text(fs: &mut dyn RemoteFs, path: &str) -> Result<String, FileError> {
    let bytes = fs.download(path)?;
    String::from_utf8(bytes).map_err(|_| FileError::Decode(path.to_string()))
}
