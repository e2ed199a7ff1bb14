//! A tree of per-directory watches.
//!
//! Platform FS notification is assumed non-recursive; `notify` is used here
//! purely as a single-directory watch primitive (`RecursiveMode::NonRecursive`
//! at every call site), and recursion is implemented by constructing a child
//! `WatchNode` for every subdirectory, mirroring the directory tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// How long to wait before retrying a watch that failed because the
/// directory was not yet fully created.
const NOT_FOUND_RETRY_DELAY: Duration = Duration::from_millis(750);

/// One node per watched directory.
///
/// Owns a native, non-recursive watch handle and a set of child nodes for
/// subdirectories. Child construction/disposal is guarded by `children`'s
/// mutex; parent mutexes are never held across child construction.
pub struct WatchNode {
    path: PathBuf,
    watcher: Mutex<Option<RecommendedWatcher>>,
    children: Mutex<HashMap<PathBuf, Arc<WatchNode>>>,
}

impl WatchNode {
    /// Returns the directory this node watches.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if a child node for `path` already exists.
    #[must_use]
    pub fn has_child(&self, path: &Path) -> bool {
        self.children.lock().unwrap().contains_key(path)
    }

    /// Constructs a watch node for `path`, opening a native watch and
    /// recursively constructing nodes for every existing subdirectory.
    ///
    /// On a not-found error during the initial watch call, sleeps 750 ms
    /// and retries once; on a second failure, logs and returns `None`
    /// without raising. This call is synchronous and blocking by design —
    /// callers run it inside `tokio::task::spawn_blocking`.
    #[must_use]
    pub fn construct(path: PathBuf, raw_tx: UnboundedSender<notify::Result<notify::Event>>) -> Option<Arc<Self>> {
        let watcher = match open_watch(&path, raw_tx.clone()) {
            Ok(w) => w,
            Err(err) => {
                if is_not_found(&err) {
                    std::thread::sleep(NOT_FOUND_RETRY_DELAY);
                    match open_watch(&path, raw_tx.clone()) {
                        Ok(w) => w,
                        Err(err) => {
                            warn!(path = %path.display(), %err, "abandoning directory after retry");
                            return None;
                        }
                    }
                } else {
                    warn!(path = %path.display(), %err, "could not watch directory");
                    return None;
                }
            }
        };

        let node = Arc::new(Self {
            path: path.clone(),
            watcher: Mutex::new(Some(watcher)),
            children: Mutex::new(HashMap::new()),
        });

        if let Ok(entries) = std::fs::read_dir(&path) {
            for entry in entries.flatten() {
                let child_path = entry.path();
                if child_path.is_dir() {
                    if let Some(child) = Self::construct(child_path.clone(), raw_tx.clone()) {
                        node.children.lock().unwrap().insert(child_path, child);
                    }
                }
            }
        }

        Some(node)
    }

    /// Adds a freshly-constructed child node, returning `false` if one
    /// already exists for that path.
    pub fn insert_child(&self, child: Arc<WatchNode>) -> bool {
        let mut children = self.children.lock().unwrap();
        if children.contains_key(&child.path) {
            return false;
        }
        children.insert(child.path.clone(), child);
        true
    }

    /// Removes and disposes the child node at `path`, if any.
    pub fn remove_child(&self, path: &Path) {
        let child = self.children.lock().unwrap().remove(path);
        if let Some(child) = child {
            child.dispose();
        }
    }

    /// Finds the descendant node exactly matching `path`, if any.
    #[must_use]
    pub fn find(&self, path: &Path) -> Option<Arc<WatchNode>> {
        if self.path.as_path() == path {
            return None; // a node never matches itself via find from a parent
        }
        let children = self.children.lock().unwrap();
        if let Some(direct) = children.get(path) {
            return Some(direct.clone());
        }
        for child in children.values() {
            if let Some(found) = child.find(path) {
                return Some(found);
            }
        }
        None
    }

    /// Disposes this node: children are disposed before self, then the
    /// native watch handle is dropped.
    pub fn dispose(&self) {
        let children: Vec<Arc<WatchNode>> = {
            let mut guard = self.children.lock().unwrap();
            guard.drain().map(|(_, v)| v).collect()
        };
        for child in children {
            child.dispose();
        }
        *self.watcher.lock().unwrap() = None;
        debug!(path = %self.path.display(), "watch node disposed");
    }
}

fn open_watch(
    path: &Path,
    raw_tx: UnboundedSender<notify::Result<notify::Event>>,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            let _ = raw_tx.send(res);
        },
        notify::Config::default(),
    )?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

fn is_not_found(err: &notify::Error) -> bool {
    matches!(err.kind, notify::ErrorKind::PathNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn construct_recurses_into_existing_subdirectories() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let node = WatchNode::construct(dir.path().to_path_buf(), tx).expect("root watch");
        assert!(node.has_child(&sub));
    }

    #[test]
    fn dispose_clears_children() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let node = WatchNode::construct(dir.path().to_path_buf(), tx).unwrap();
        node.dispose();
        assert!(!node.has_child(&sub));
    }

    #[test]
    fn insert_child_rejects_duplicate() {
        let dir = tempdir().unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let node = WatchNode::construct(dir.path().to_path_buf(), tx.clone()).unwrap();

        let sub = dir.path().join("new_sub");
        std::fs::create_dir(&sub).unwrap();
        let child_a = WatchNode::construct(sub.clone(), tx.clone()).unwrap();
        let child_b = WatchNode::construct(sub.clone(), tx).unwrap();

        assert!(node.insert_child(child_a));
        assert!(!node.insert_child(child_b));
    }
}
