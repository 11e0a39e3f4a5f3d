//! In-memory [`RemoteFs`] for exercising fetch and publish without a
//! remote host.
//!
//! A [`MemoryFs`] is a cheap handle onto shared state, so a test can keep a
//! [`MemoryView`] after the adapter has been boxed into a [`Connection`]
//! and inspect what the operation did to the tree.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::config::{Credentials, Protocol};
use crate::errors::{FileError, SyncError};
use crate::files::path::{ancestor_chain, join_remote, parent_dir};
use crate::files::{EntryKind, RemoteEntry};

use super::{Connection, Connector, DirectoryStatus, DirectoryStep, RemoteFs};

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
    Symlink,
    /// A directory whose listing is another directory's listing.
    Alias(String),
}

#[derive(Debug, Default)]
struct State {
    nodes: HashMap<String, Node>,
    /// Child names per directory, in insertion order.
    children: HashMap<String, Vec<(String, EntryKind)>>,
    fail_list: HashSet<String>,
    fail_download: HashSet<String>,
    fail_upload: HashSet<String>,
    fail_mkdir: HashSet<String>,
    connects: usize,
    disconnects: usize,
    ops: Vec<String>,
}

impl State {
    fn insert_dir(&mut self, path: &str) {
        for dir in ancestor_chain(path) {
            if self.nodes.contains_key(&dir) {
                continue;
            }
            self.link(&dir, EntryKind::Directory);
            self.nodes.insert(dir.clone(), Node::Dir);
            self.children.entry(dir).or_default();
        }
    }

    fn link(&mut self, path: &str, kind: EntryKind) {
        let parent = parent_dir(path).to_string();
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        self.children.entry(parent).or_default().push((name, kind));
    }

    fn insert_leaf(&mut self, path: &str, node: Node, kind: EntryKind) {
        self.insert_dir(parent_dir(path));
        if !self.nodes.contains_key(path) {
            self.link(path, kind);
        }
        self.nodes.insert(path.to_string(), node);
    }

    /// Follow directory aliases segment by segment.
    fn resolve(&self, path: &str) -> String {
        let mut current = "/".to_string();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = join_remote(&current, segment);
            if let Some(Node::Alias(target)) = self.nodes.get(&current) {
                current = target.clone();
            }
        }
        current
    }
}

fn absolute(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// In-memory remote tree.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    protocol: Protocol,
    state: Arc<Mutex<State>>,
}

impl MemoryFs {
    pub fn new(protocol: Protocol) -> Self {
        let mut state = State::default();
        state.nodes.insert("/".to_string(), Node::Dir);
        state.children.insert("/".to_string(), Vec::new());
        Self {
            protocol,
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Same tree, different protocol flavor.
    pub fn with_protocol(&self, protocol: Protocol) -> Self {
        Self {
            protocol,
            state: self.state.clone(),
        }
    }

    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        self.state().insert_dir(&absolute(path));
        self
    }

    pub fn add_file(&mut self, path: &str, content: impl AsRef<[u8]>) -> &mut Self {
        let path = absolute(path);
        self.state()
            .insert_leaf(&path, Node::File(content.as_ref().to_vec()), EntryKind::File);
        self
    }

    pub fn add_symlink(&mut self, path: &str) -> &mut Self {
        self.state()
            .insert_leaf(&absolute(path), Node::Symlink, EntryKind::Symlink);
        self
    }

    /// Add a directory entry at `path` that lists the contents of `target`.
    pub fn add_dir_alias(&mut self, path: &str, target: &str) -> &mut Self {
        self.state().insert_leaf(
            &absolute(path),
            Node::Alias(absolute(target)),
            EntryKind::Directory,
        );
        self
    }

    /// Append a listing entry to `dir` without creating a node for it.
    pub fn add_raw_entry(&mut self, dir: &str, name: &str, kind: EntryKind) -> &mut Self {
        let dir = absolute(dir);
        let mut state = self.state();
        state.insert_dir(&dir);
        state
            .children
            .entry(dir)
            .or_default()
            .push((name.to_string(), kind));
        drop(state);
        self
    }

    pub fn fail_list(&mut self, path: &str) -> &mut Self {
        self.state().fail_list.insert(absolute(path));
        self
    }

    pub fn fail_download(&mut self, path: &str) -> &mut Self {
        self.state().fail_download.insert(absolute(path));
        self
    }

    pub fn fail_upload(&mut self, path: &str) -> &mut Self {
        self.state().fail_upload.insert(absolute(path));
        self
    }

    pub fn fail_mkdir(&mut self, path: &str) -> &mut Self {
        self.state().fail_mkdir.insert(absolute(path));
        self
    }

    pub fn view(&self) -> MemoryView {
        MemoryView {
            state: self.state.clone(),
        }
    }
}

impl RemoteFs for MemoryFs {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>, FileError> {
        let mut state = self.state();
        let resolved = state.resolve(dir);
        state.ops.push(format!("list {dir}"));
        if state.fail_list.contains(&resolved) {
            return Err(FileError::PermissionDenied(dir.to_string()));
        }
        let children = state
            .children
            .get(&resolved)
            .ok_or_else(|| FileError::NotFound(dir.to_string()))?;
        Ok(children
            .iter()
            .map(|(name, kind)| RemoteEntry {
                name: name.clone(),
                full_path: join_remote(dir, name),
                kind: *kind,
            })
            .collect())
    }

    fn download(&mut self, path: &str) -> Result<Vec<u8>, FileError> {
        let mut state = self.state();
        let resolved = state.resolve(path);
        state.ops.push(format!("download {path}"));
        if state.fail_download.contains(&resolved) {
            return Err(FileError::PermissionDenied(path.to_string()));
        }
        match state.nodes.get(&resolved) {
            Some(Node::File(data)) => Ok(data.clone()),
            _ => Err(FileError::NotFound(path.to_string())),
        }
    }

    fn upload(&mut self, path: &str, data: &[u8]) -> Result<(), FileError> {
        let mut state = self.state();
        let resolved = state.resolve(path);
        state.ops.push(format!("upload {path}"));
        if state.fail_upload.contains(&resolved) {
            return Err(FileError::PermissionDenied(path.to_string()));
        }
        match state.nodes.get(parent_dir(&resolved)) {
            Some(Node::Dir) => {}
            _ => return Err(FileError::NotFound(parent_dir(path).to_string())),
        }
        state.insert_leaf(&resolved, Node::File(data.to_vec()), EntryKind::File);
        Ok(())
    }

    fn ensure_directory_chain(&mut self, dir: &str) -> Vec<DirectoryStep> {
        let stop_on_failure = self.protocol == Protocol::Ftp;
        let mut state = self.state();
        let mut steps = Vec::new();
        for prefix in ancestor_chain(&absolute(dir)) {
            let exists = matches!(
                state.nodes.get(&prefix),
                Some(Node::Dir) | Some(Node::Alias(_))
            );
            let status = if exists {
                DirectoryStatus::Existed
            } else if state.fail_mkdir.contains(&prefix) {
                DirectoryStatus::Failed(format!("mkdir {prefix}: permission denied"))
            } else {
                state.ops.push(format!("mkdir {prefix}"));
                state.insert_dir(&prefix);
                DirectoryStatus::Created
            };
            let failed = matches!(status, DirectoryStatus::Failed(_));
            steps.push(DirectoryStep::new(prefix, status));
            if failed && stop_on_failure {
                break;
            }
        }
        steps
    }

    fn disconnect(&mut self) -> Result<(), FileError> {
        self.state().disconnects += 1;
        Ok(())
    }
}

/// Read-only view of a [`MemoryFs`] tree and its counters.
#[derive(Debug, Clone)]
pub struct MemoryView {
    state: Arc<Mutex<State>>,
}

impl MemoryView {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn connects(&self) -> usize {
        self.state().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state().disconnects
    }

    /// Contents of a file as text, if it exists.
    pub fn file(&self, path: &str) -> Option<String> {
        match self.state().nodes.get(&absolute(path)) {
            Some(Node::File(data)) => Some(String::from_utf8_lossy(data).into_owned()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(self.state().nodes.get(&absolute(path)), Some(Node::Dir))
    }

    /// Operations performed so far, e.g. `"mkdir /root/a"`, `"upload /root/a/x.css"`.
    pub fn ops(&self) -> Vec<String> {
        self.state().ops.clone()
    }
}

/// [`Connector`] that hands out handles onto one [`MemoryFs`] tree.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    fs: MemoryFs,
    connect_error: Option<String>,
}

impl MemoryConnector {
    pub fn new(fs: MemoryFs) -> Self {
        Self {
            fs,
            connect_error: None,
        }
    }

    /// A connector whose every connect attempt fails with `message`.
    pub fn failing(fs: MemoryFs, message: &str) -> Self {
        Self {
            fs,
            connect_error: Some(message.to_string()),
        }
    }
}

impl Connector for MemoryConnector {
    fn connect(
        &self,
        credentials: &Credentials,
        _timeout: Duration,
    ) -> Result<Connection, SyncError> {
        self.fs.state().connects += 1;
        if let Some(message) = &self.connect_error {
            return Err(SyncError::Connection(message.clone()));
        }
        Ok(Connection::new(Box::new(
            self.fs.with_protocol(credentials.protocol),
        )))
    }
}
