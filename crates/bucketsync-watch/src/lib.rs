//! Recursive filesystem watching: one native watch per directory, wired
//! into a tree that grows and shrinks as directories are created and
//! removed beneath the root.

pub mod change_event;
pub mod watch_node;
pub mod watch_tree;

pub use change_event::ChangeEvent;
pub use watch_tree::WatchTree;
