//! Backend-neutral filesystem events.

use std::path::PathBuf;

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsEventKind {
    /// The path appeared (created or renamed into place).
    Created,
    /// The path's contents or metadata changed.
    Modified,
    /// The path disappeared (deleted or renamed away).
    Removed,
}

/// A single path-level event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FsEvent {
    /// Event kind.
    pub kind: FsEventKind,
    /// Absolute path the event refers to.
    pub path: PathBuf,
}

impl FsEvent {
    /// Build an event.
    #[must_use]
    pub fn new(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Shorthand for a `Created` event.
    #[must_use]
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(FsEventKind::Created, path)
    }

    /// Shorthand for a `Modified` event.
    #[must_use]
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(FsEventKind::Modified, path)
    }

    /// Shorthand for a `Removed` event.
    #[must_use]
    pub fn removed(path: impl Into<PathBuf>) -> Self {
        Self::new(FsEventKind::Removed, path)
    }
}

/// Translate a notify event into zero or more path events.
///
/// Renames are split: the old name is `Removed` and the new name `Created`, so
/// a writer that renames `x.csv.part` to `x.csv` arms `x.csv`.
#[must_use]
pub fn translate(event: Event) -> Vec<FsEvent> {
    let Event { kind, paths, .. } = event;
    match kind {
        EventKind::Create(_) => paths.into_iter().map(FsEvent::created).collect(),
        EventKind::Remove(_) => paths.into_iter().map(FsEvent::removed).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => translate_rename(mode, paths),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => {
            paths.into_iter().map(FsEvent::modified).collect()
        }
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            paths.into_iter().map(FsEvent::modified).collect()
        }
        EventKind::Access(_) => Vec::new(),
    }
}

fn translate_rename(mode: RenameMode, paths: Vec<PathBuf>) -> Vec<FsEvent> {
    match mode {
        RenameMode::From => paths.into_iter().map(FsEvent::removed).collect(),
        RenameMode::To => paths.into_iter().map(FsEvent::created).collect(),
        RenameMode::Both => {
            let mut paths = paths.into_iter();
            let mut events = Vec::with_capacity(2);
            if let Some(from) = paths.next() {
                events.push(FsEvent::removed(from));
            }
            events.extend(paths.map(FsEvent::created));
            events
        }
        // Backend could not tell which side this is; the filesystem can.
        RenameMode::Any | RenameMode::Other => paths
            .into_iter()
            .map(|path| {
                if path.exists() {
                    FsEvent::created(path)
                } else {
                    FsEvent::removed(path)
                }
            })
            .collect(),
    }
}
