pub mod path;

use serde::{Deserialize, Serialize};

/// How a remote listing classifies an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    /// Sockets, devices and anything the server reports ambiguously.
    Other,
}

/// One entry of a remote directory listing.
///
/// Only lives inside the walker frame that listed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub full_path: String,
    pub kind: EntryKind,
}

/// A text file pulled from (or pushed to) a remote tree.
///
/// `name` is relative to the remote root with leading slashes stripped.
/// Serialized as `{ "name", "content" }` for the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedFile {
    pub name: String,
    pub content: String,
}

/// Case-insensitive allow-list of file extensions.
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Whether the file name ends in `.<ext>` for an allowed extension.
    pub fn matches(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        match lower.rsplit_once('.') {
            Some((_, ext)) => self.extensions.iter().any(|e| e == ext),
            None => false,
        }
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(crate::config::default_extensions())
    }
}
