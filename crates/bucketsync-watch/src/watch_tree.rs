//! `WatchTree`: the public entry point wiring a `WatchNode` tree to a
//! stream of `ChangeEvent`s.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};
use notify::EventKind;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::change_event::{map_notify_event, ChangeEvent};
use crate::watch_node::WatchNode;

/// A recursive watch over a directory tree, implemented as a tree of
/// per-directory watches rather than relying on the platform's recursive
/// notification flag (unreliable once subdirectories are created after
/// startup).
pub struct WatchTree {
    root: Arc<WatchNode>,
    dispatcher: JoinHandle<()>,
}

impl WatchTree {
    /// Starts watching `root` and every existing subdirectory beneath it.
    ///
    /// Returns the tree handle and a channel that yields one `ChangeEvent`
    /// per observed modification of a regular file anywhere beneath `root`,
    /// including files under subdirectories created after startup.
    ///
    /// # Errors
    /// Returns an error if the root directory itself cannot be watched even
    /// after the 750 ms retry.
    pub async fn start(root: PathBuf) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<ChangeEvent>)> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<notify::Result<notify::Event>>();
        let (change_tx, change_rx) = mpsc::unbounded_channel::<ChangeEvent>();

        let build_tx = raw_tx.clone();
        let root_for_build = root.clone();
        let root_node = tokio::task::spawn_blocking(move || {
            WatchNode::construct(root_for_build, build_tx)
        })
        .await?
        .ok_or_else(|| anyhow::anyhow!("could not establish a watch on {}", root.display()))?;

        let dispatcher = tokio::spawn(dispatch_loop(raw_rx, root_node.clone(), raw_tx, change_tx));

        Ok((
            Self {
                root: root_node,
                dispatcher,
            },
            change_rx,
        ))
    }

    /// Returns the root directory this tree watches.
    #[must_use]
    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Tears the tree down: disposes every node (children before parents)
    /// and stops the dispatch task.
    pub async fn dispose(self) {
        let root = self.root.clone();
        let _ = tokio::task::spawn_blocking(move || root.dispose()).await;
        self.dispatcher.abort();
    }
}

async fn dispatch_loop(
    mut raw_rx: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    root: Arc<WatchNode>,
    raw_tx: mpsc::UnboundedSender<notify::Result<notify::Event>>,
    change_tx: mpsc::UnboundedSender<ChangeEvent>,
) {
    while let Some(result) = raw_rx.recv().await {
        match result {
            Ok(event) => handle_event(&event, &root, &raw_tx, &change_tx).await,
            Err(err) => warn!(%err, "watch error"),
        }
    }
    debug!("watch dispatcher stopped");
}

async fn handle_event(
    event: &notify::Event,
    root: &Arc<WatchNode>,
    raw_tx: &mpsc::UnboundedSender<notify::Result<notify::Event>>,
    change_tx: &mpsc::UnboundedSender<ChangeEvent>,
) {
    let is_directory_create = matches!(event.kind, EventKind::Create(notify::event::CreateKind::Folder))
        || matches!(event.kind, EventKind::Modify(ModifyKind::Name(RenameMode::To)));
    let is_directory_remove = matches!(event.kind, EventKind::Remove(notify::event::RemoveKind::Folder));

    for path in &event.paths {
        if is_directory_remove {
            if let Some(parent) = parent_node(root, path) {
                parent.remove_child(path);
                continue;
            }
        }

        if is_directory_create && path.is_dir() {
            if let Some(parent) = parent_node(root, path) {
                if !parent.has_child(path) {
                    let raw_tx = raw_tx.clone();
                    let path = path.clone();
                    if let Some(child) =
                        tokio::task::spawn_blocking(move || WatchNode::construct(path, raw_tx))
                            .await
                            .ok()
                            .flatten()
                    {
                        parent.insert_child(child);
                    }
                }
            }
            continue;
        }
    }

    if let Some(change) = map_notify_event(event) {
        let _ = change_tx.send(change);
    }
}

/// Finds the node whose directory is the parent of `path`.
fn parent_node(root: &Arc<WatchNode>, path: &Path) -> Option<Arc<WatchNode>> {
    let parent = path.parent()?;
    if root.path() == parent {
        return Some(root.clone());
    }
    root.find(parent)
}
