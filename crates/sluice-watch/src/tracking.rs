//! Per-path tracking state.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use dashmap::DashMap;

/// Lifecycle of a tracked path. Untracked paths are simply absent from the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathState {
    /// Seen, not yet known to be complete.
    Discovered,
    /// Complete and eligible for processing.
    Ready,
}

/// Size and modification time, the pair that defines "unchanged".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileSnapshot {
    /// Length in bytes.
    pub size: u64,
    /// Last modification time, when the platform reports one.
    pub modified: Option<SystemTime>,
}

impl FileSnapshot {
    /// Snapshot from metadata.
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }

    /// Stat `path` without following symlinks; `None` when it is not a regular file.
    ///
    /// # Errors
    ///
    /// Propagates the stat failure, including `NotFound`.
    pub fn capture(path: &Path) -> io::Result<Option<Self>> {
        let metadata = std::fs::symlink_metadata(path)?;
        Ok(metadata.is_file().then(|| Self::from_metadata(&metadata)))
    }
}

/// What the detector knows about one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedPath {
    /// Tracked path.
    pub path: PathBuf,
    /// Current state.
    pub state: PathState,
    /// Latest observed size and mtime, if the rule records them.
    pub snapshot: Option<FileSnapshot>,
    /// When the path was first tracked.
    pub first_seen: Instant,
    /// When the snapshot last changed.
    pub last_change: Instant,
}

impl TrackedPath {
    /// Newly discovered path.
    #[must_use]
    pub fn discovered(path: PathBuf, snapshot: Option<FileSnapshot>, now: Instant) -> Self {
        Self {
            path,
            state: PathState::Discovered,
            snapshot,
            first_seen: now,
            last_change: now,
        }
    }

    /// Record a fresh observation; returns whether size or mtime changed.
    pub fn observe(&mut self, snapshot: FileSnapshot, now: Instant) -> bool {
        if self.snapshot == Some(snapshot) {
            return false;
        }
        self.snapshot = Some(snapshot);
        self.last_change = now;
        self.state = PathState::Discovered;
        true
    }

    /// Whether the path is ready for processing.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == PathState::Ready
    }
}

/// Paths the processor finished without moving, keyed to the snapshot they had.
///
/// Events for a settled path are dropped while its size and mtime still match, so
/// rescans do not re-arm content already known to be a duplicate. Any change to the
/// file, or its removal, lifts the entry.
#[derive(Debug)]
pub struct SettledPaths {
    entries: DashMap<PathBuf, FileSnapshot>,
    capacity: usize,
}

impl SettledPaths {
    /// Upper bound used by the detector.
    pub const DEFAULT_CAPACITY: usize = 65_536;

    /// Empty set holding at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Remember `path` as it is on disk now. Returns `false` if it could not be stat'ed.
    pub fn settle(&self, path: &Path) -> bool {
        let Ok(Some(snapshot)) = FileSnapshot::capture(path) else {
            return false;
        };
        if self.entries.len() >= self.capacity && !self.entries.contains_key(path) {
            // Arbitrary eviction; the evicted path is at worst reported once more.
            let victim = self.entries.iter().next().map(|entry| entry.key().clone());
            if let Some(victim) = victim {
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(path.to_path_buf(), snapshot);
        true
    }

    /// Whether `path` is settled and unchanged since. A changed path is released.
    #[must_use]
    pub fn holds(&self, path: &Path) -> bool {
        let Some(settled) = self.entries.get(path).map(|entry| *entry.value()) else {
            return false;
        };
        if matches!(FileSnapshot::capture(path), Ok(Some(current)) if current == settled) {
            return true;
        }
        self.entries.remove(path);
        false
    }

    /// Drop `path`. Returns whether it was settled.
    pub fn release(&self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Number of settled paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is settled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SettledPaths {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_test_support::fixtures::{temp_workspace, write_file};
    use std::time::Duration;

    fn snapshot(size: u64, secs: u64) -> FileSnapshot {
        FileSnapshot {
            size,
            modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)),
        }
    }

    #[test]
    fn observe_resets_on_size_or_mtime_change() {
        let start = Instant::now();
        let later = start + Duration::from_secs(1);
        let mut tracked = TrackedPath::discovered("x.csv".into(), Some(snapshot(4, 10)), start);
        tracked.state = PathState::Ready;

        assert!(!tracked.observe(snapshot(4, 10), later));
        assert_eq!(tracked.last_change, start);
        assert!(tracked.is_ready());

        assert!(tracked.observe(snapshot(4, 11), later));
        assert_eq!(tracked.last_change, later);
        assert_eq!(tracked.state, PathState::Discovered);

        let latest = later + Duration::from_secs(1);
        assert!(tracked.observe(snapshot(8, 11), latest));
        assert_eq!(tracked.last_change, latest);
    }

    #[test]
    fn settled_path_is_released_by_a_change() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let path = write_file(workspace.path(), "dup.csv", b"same")?;
        let settled = SettledPaths::default();

        assert!(settled.settle(&path));
        assert!(settled.holds(&path));
        assert!(settled.holds(&path));

        std::fs::write(&path, b"different bytes")?;
        assert!(!settled.holds(&path));
        assert!(settled.is_empty());
        Ok(())
    }

    #[test]
    fn settled_set_stays_within_capacity() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let settled = SettledPaths::with_capacity(2);
        for name in ["a.csv", "b.csv", "c.csv"] {
            let path = write_file(workspace.path(), name, name.as_bytes())?;
            assert!(settled.settle(&path));
        }
        assert_eq!(settled.len(), 2);
        assert!(!settled.settle(&workspace.path().join("missing.csv")));
        Ok(())
    }
}
