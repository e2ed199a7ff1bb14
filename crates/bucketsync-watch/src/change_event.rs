//! Filesystem change events and the mapping from raw `notify` events.
//!
//! `map_notify_event` is a faithful mapping of `notify::EventKind`
//! regardless of what consumes the resulting `ChangeEvent` downstream.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// A single observed filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A new file or directory was created.
    Created(PathBuf),
    /// An existing file was modified.
    Modified(PathBuf),
    /// A file or directory was deleted.
    Deleted(PathBuf),
    /// A file or directory was renamed.
    Renamed {
        /// Path before the rename.
        old: PathBuf,
        /// Path after the rename.
        new: PathBuf,
    },
}

impl ChangeEvent {
    /// Returns the primary path this event concerns (the destination path
    /// for a rename).
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(p) | Self::Modified(p) | Self::Deleted(p) => p,
            Self::Renamed { new, .. } => new,
        }
    }
}

/// Maps a raw `notify::Event` to a `ChangeEvent`, or `None` if the event
/// carries no paths or is not relevant (e.g. access events).
#[must_use]
pub fn map_notify_event(event: &Event) -> Option<ChangeEvent> {
    match &event.kind {
        EventKind::Create(_) => event.paths.first().cloned().map(ChangeEvent::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            Some(ChangeEvent::Renamed {
                old: event.paths[0].clone(),
                new: event.paths[1].clone(),
            })
        }
        EventKind::Modify(_) => event.paths.first().cloned().map(ChangeEvent::Modified),
        EventKind::Remove(_) => event.paths.first().cloned().map(ChangeEvent::Deleted),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind};

    fn event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
        Event {
            kind,
            paths,
            attrs: Default::default(),
        }
    }

    #[test]
    fn maps_create() {
        let e = event(EventKind::Create(CreateKind::File), vec![PathBuf::from("/a")]);
        assert_eq!(map_notify_event(&e), Some(ChangeEvent::Created(PathBuf::from("/a"))));
    }

    #[test]
    fn maps_modify_data() {
        let e = event(
            EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content)),
            vec![PathBuf::from("/a")],
        );
        assert_eq!(map_notify_event(&e), Some(ChangeEvent::Modified(PathBuf::from("/a"))));
    }

    #[test]
    fn maps_rename_both() {
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec![PathBuf::from("/old"), PathBuf::from("/new")],
        );
        assert_eq!(
            map_notify_event(&e),
            Some(ChangeEvent::Renamed {
                old: PathBuf::from("/old"),
                new: PathBuf::from("/new"),
            })
        );
    }

    #[test]
    fn rename_both_with_wrong_path_count_falls_back_to_modified() {
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec![PathBuf::from("/only-one")],
        );
        assert_eq!(
            map_notify_event(&e),
            Some(ChangeEvent::Modified(PathBuf::from("/only-one")))
        );
    }

    #[test]
    fn maps_remove() {
        let e = event(EventKind::Remove(RemoveKind::File), vec![PathBuf::from("/a")]);
        assert_eq!(map_notify_event(&e), Some(ChangeEvent::Deleted(PathBuf::from("/a"))));
    }

    #[test]
    fn access_event_ignored() {
        let e = event(
            EventKind::Access(notify::event::AccessKind::Read),
            vec![PathBuf::from("/a")],
        );
        assert_eq!(map_notify_event(&e), None);
    }

    #[test]
    fn no_paths_is_none() {
        let e = event(EventKind::Create(CreateKind::File), vec![]);
        assert_eq!(map_notify_event(&e), None);
    }
}
