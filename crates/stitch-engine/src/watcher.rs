//! Source tree watcher
//!
//! Bridges `notify`'s callback thread into the event loop through a smol
//! channel. Changes inside the target directory or a build workspace are
//! dropped here, since builds write there themselves.

use std::path::{Component, Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use smol::channel::{self, Receiver};

use crate::workspace::is_workspace_dir_name;
use crate::{BuildError, BuildResult};

/// A relevant change under the watched root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub paths: Vec<PathBuf>,
}

/// Recursive watcher on the source directory
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<ChangeEvent>,
    root: PathBuf,
}

impl SourceWatcher {
    /// Start watching `root`, ignoring anything under `ignore`
    pub fn new(root: &Path, ignore: &Path) -> BuildResult<Self> {
        let root = std::fs::canonicalize(root).map_err(|e| BuildError::io(root, e))?;
        let ignore = canonical_target(ignore);
        let (tx, rx) = channel::unbounded();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Some(change) = relevant_change(&event, &ignore) {
                        // The receiver is gone once the server shuts down
                        let _ = tx.send_blocking(change);
                    }
                }
                Err(err) => tracing::warn!("Watch error: {}", err),
            },
            Config::default(),
        )
        .map_err(|e| watch_error(&root, e))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| watch_error(&root, e))?;
        tracing::info!("Watching {}", root.display());

        Ok(Self {
            _watcher: watcher,
            events: rx,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Channel of change events; closes when the watcher is dropped
    pub fn events(&self) -> Receiver<ChangeEvent> {
        self.events.clone()
    }
}

/// Canonical form of a directory that may not exist yet
fn canonical_target(path: &Path) -> PathBuf {
    if let Ok(path) = std::fs::canonicalize(path) {
        return path;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    }
}

fn watch_error(root: &Path, err: notify::Error) -> BuildError {
    BuildError::io(root, std::io::Error::other(err.to_string()))
}

fn relevant_change(event: &Event, ignore: &Path) -> Option<ChangeEvent> {
    if matches!(event.kind, EventKind::Access(_)) {
        return None;
    }
    let paths: Vec<PathBuf> = event
        .paths
        .iter()
        .filter(|path| !is_ignored(path, ignore))
        .cloned()
        .collect();
    if paths.is_empty() {
        None
    } else {
        Some(ChangeEvent { paths })
    }
}

/// Paths inside `ignore` or inside any workspace directory
pub fn is_ignored(path: &Path, ignore: &Path) -> bool {
    if path.starts_with(ignore) {
        return true;
    }
    path.components().any(|c| match c {
        Component::Normal(seg) => seg.to_str().is_some_and(is_workspace_dir_name),
        _ => false,
    })
}
