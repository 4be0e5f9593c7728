//! Completion rules.
//!
//! # Design
//! - A rule folds create/modify events into the tracking map and answers which
//!   tracked paths are ready. Removal is handled by the detector for every rule.
//! - Stats happen before a map entry is locked; no shard lock is held across I/O.
//! - [`Rule`] is the configured variant; it dispatches to the concrete rule.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sluice_config::CompletionPolicy;
use sluice_fsops::{SIDECAR_SUFFIX, is_candidate, sidecar_target};
use tracing::{debug, info};

use crate::tracking::{FileSnapshot, PathState, TrackedPath};

/// Concurrent map of tracked paths.
pub type TrackingMap = DashMap<PathBuf, TrackedPath>;

/// Decides when a tracked path is complete.
pub trait CompletionRule: Send + Sync {
    /// Fold a create or modify event for `path` into `tracked`.
    fn on_change(&self, tracked: &TrackingMap, path: &Path, now: Instant);

    /// Paths ready for processing at `now`, sorted.
    fn ready(&self, tracked: &TrackingMap, now: Instant) -> Vec<PathBuf>;
}

/// Ready once neither size nor mtime has changed for `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityRule {
    window: Duration,
}

impl StabilityRule {
    /// Rule with the given quiet period.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Configured quiet period.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    fn elapsed(&self, entry: &TrackedPath, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_change) >= self.window
    }
}

impl CompletionRule for StabilityRule {
    fn on_change(&self, tracked: &TrackingMap, path: &Path, now: Instant) {
        if !is_candidate(path) {
            return;
        }
        let snapshot = match FileSnapshot::capture(path) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(err) => {
                forget_on_missing(tracked, path, &err);
                return;
            }
        };

        match tracked.entry(path.to_path_buf()) {
            Entry::Vacant(slot) => {
                info!(path = %path.display(), size = snapshot.size, "discovered");
                slot.insert(TrackedPath::discovered(path.to_path_buf(), Some(snapshot), now));
            }
            Entry::Occupied(mut slot) => {
                if slot.get_mut().observe(snapshot, now) {
                    debug!(path = %path.display(), size = snapshot.size, "changed; window restarted");
                }
            }
        }
    }

    fn ready(&self, tracked: &TrackingMap, now: Instant) -> Vec<PathBuf> {
        let due: Vec<PathBuf> = tracked
            .iter()
            .filter(|entry| self.elapsed(entry.value(), now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut ready = Vec::with_capacity(due.len());
        for path in due {
            // Re-stat so a writer that went quiet without events still resets the window.
            let current = match FileSnapshot::capture(&path) {
                Ok(Some(current)) => current,
                Ok(None) => {
                    tracked.remove(&path);
                    continue;
                }
                Err(err) => {
                    forget_on_missing(tracked, &path, &err);
                    continue;
                }
            };
            let Some(mut entry) = tracked.get_mut(&path) else {
                continue;
            };
            if entry.observe(current, now) || !self.elapsed(&entry, now) {
                continue;
            }
            if entry.state != PathState::Ready {
                entry.state = PathState::Ready;
                info!(path = %path.display(), size = current.size, "ready");
            }
            drop(entry);
            ready.push(path);
        }
        ready.sort();
        ready
    }
}

/// Ready once a `<name>.ok` marker exists next to the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SidecarRule;

impl SidecarRule {
    fn mark_ready(tracked: &TrackingMap, path: &Path, now: Instant) {
        let mut entry = tracked
            .entry(path.to_path_buf())
            .or_insert_with(|| TrackedPath::discovered(path.to_path_buf(), None, now));
        if entry.state != PathState::Ready {
            entry.state = PathState::Ready;
            info!(path = %path.display(), "ready");
        }
    }
}

impl CompletionRule for SidecarRule {
    fn on_change(&self, tracked: &TrackingMap, path: &Path, now: Instant) {
        if let Some(target) = sidecar_target(path) {
            if !is_candidate(&target) || !is_regular_file(&target) {
                debug!(marker = %path.display(), "marker without a candidate target");
            } else if marker_is_fresh(path, &target) {
                Self::mark_ready(tracked, &target, now);
            } else {
                debug!(marker = %path.display(), "marker predates its target; ignored");
            }
            return;
        }
        if !is_candidate(path) || !is_regular_file(path) {
            return;
        }

        if let Entry::Vacant(slot) = tracked.entry(path.to_path_buf()) {
            info!(path = %path.display(), "discovered");
            slot.insert(TrackedPath::discovered(path.to_path_buf(), None, now));
        }
        // The marker may have landed before the file's own event was delivered.
        // One left behind by an earlier file of the same name is older than this write.
        if marker_for(path).is_some_and(|marker| marker_is_fresh(&marker, path)) {
            Self::mark_ready(tracked, path, now);
        }
    }

    fn ready(&self, tracked: &TrackingMap, _now: Instant) -> Vec<PathBuf> {
        let mut ready: Vec<PathBuf> = tracked
            .iter()
            .filter(|entry| entry.is_ready())
            .map(|entry| entry.key().clone())
            .collect();
        ready.sort();
        ready
    }
}

/// Configured completion rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Size/mtime quiet period.
    Stability(StabilityRule),
    /// Marker file.
    Sidecar(SidecarRule),
}

impl From<CompletionPolicy> for Rule {
    fn from(policy: CompletionPolicy) -> Self {
        match policy {
            CompletionPolicy::StabilityWindow { window } => {
                Self::Stability(StabilityRule::new(window))
            }
            CompletionPolicy::Sidecar => Self::Sidecar(SidecarRule),
        }
    }
}

impl CompletionRule for Rule {
    fn on_change(&self, tracked: &TrackingMap, path: &Path, now: Instant) {
        match self {
            Self::Stability(rule) => rule.on_change(tracked, path, now),
            Self::Sidecar(rule) => rule.on_change(tracked, path, now),
        }
    }

    fn ready(&self, tracked: &TrackingMap, now: Instant) -> Vec<PathBuf> {
        match self {
            Self::Stability(rule) => rule.ready(tracked, now),
            Self::Sidecar(rule) => rule.ready(tracked, now),
        }
    }
}

fn marker_for(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    Some(path.with_file_name(format!("{name}{SIDECAR_SUFFIX}")))
}

/// A marker counts only if it was written no earlier than the target's last change.
fn marker_is_fresh(marker: &Path, target: &Path) -> bool {
    let (Ok(marker), Ok(target)) = (
        std::fs::symlink_metadata(marker),
        std::fs::symlink_metadata(target),
    ) else {
        return false;
    };
    match (marker.modified(), target.modified()) {
        (Ok(marker), Ok(target)) => marker >= target,
        // Without mtimes the marker's presence is the only signal.
        _ => true,
    }
}

fn is_regular_file(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|metadata| metadata.is_file())
}

fn forget_on_missing(tracked: &TrackingMap, path: &Path, err: &io::Error) {
    if err.kind() == io::ErrorKind::NotFound {
        if tracked.remove(path).is_some() {
            debug!(path = %path.display(), "vanished; untracked");
        }
    } else {
        debug!(path = %path.display(), error = %err, "stat failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_test_support::fixtures::{backdate, temp_workspace, write_file};
    use std::fs;

    #[test]
    fn stability_rule_waits_for_quiet_period() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let path = write_file(workspace.path(), "x.csv", b"a,b\n")?;
        let rule = StabilityRule::new(Duration::from_secs(2));
        let tracked = TrackingMap::new();
        let start = Instant::now();

        rule.on_change(&tracked, &path, start);
        assert!(rule.ready(&tracked, start + Duration::from_secs(1)).is_empty());
        assert_eq!(rule.ready(&tracked, start + Duration::from_secs(2)), vec![path]);
        Ok(())
    }

    #[test]
    fn stability_rule_resets_when_size_changes_between_events() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let path = write_file(workspace.path(), "x.csv", b"a,b\n")?;
        let rule = StabilityRule::new(Duration::from_secs(2));
        let tracked = TrackingMap::new();
        let start = Instant::now();

        rule.on_change(&tracked, &path, start);
        fs::write(&path, b"a,b\n1,2\n")?;
        // No event delivered: the re-stat at query time catches the change.
        let later = start + Duration::from_secs(3);
        assert!(rule.ready(&tracked, later).is_empty());
        assert_eq!(
            rule.ready(&tracked, later + Duration::from_secs(2)),
            vec![path]
        );
        Ok(())
    }

    #[test]
    fn stability_rule_ignores_temp_and_hidden_names() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let temp = write_file(workspace.path(), "x.csv.part", b"data")?;
        let hidden = write_file(workspace.path(), ".x.csv", b"data")?;
        let rule = StabilityRule::new(Duration::ZERO);
        let tracked = TrackingMap::new();
        let now = Instant::now();

        rule.on_change(&tracked, &temp, now);
        rule.on_change(&tracked, &hidden, now);
        assert!(tracked.is_empty());
        assert!(rule.ready(&tracked, now).is_empty());
        Ok(())
    }

    #[test]
    fn stability_rule_drops_vanished_paths() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let path = write_file(workspace.path(), "x.csv", b"data")?;
        let rule = StabilityRule::new(Duration::ZERO);
        let tracked = TrackingMap::new();
        let now = Instant::now();

        rule.on_change(&tracked, &path, now);
        fs::remove_file(&path)?;
        assert!(rule.ready(&tracked, now).is_empty());
        assert!(tracked.is_empty());
        Ok(())
    }

    #[test]
    fn sidecar_rule_requires_marker() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let path = write_file(workspace.path(), "x.csv", b"data")?;
        let rule = SidecarRule;
        let tracked = TrackingMap::new();
        let now = Instant::now();

        rule.on_change(&tracked, &path, now);
        assert_eq!(tracked.len(), 1);
        assert!(rule.ready(&tracked, now + Duration::from_secs(3600)).is_empty());

        let marker = write_file(workspace.path(), "x.csv.ok", b"")?;
        rule.on_change(&tracked, &marker, now);
        assert_eq!(rule.ready(&tracked, now), vec![path]);
        assert_eq!(tracked.len(), 1);
        Ok(())
    }

    #[test]
    fn sidecar_rule_accepts_marker_seen_before_file_event() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let path = write_file(workspace.path(), "x.csv", b"data")?;
        write_file(workspace.path(), "x.csv.ok", b"")?;
        let rule = SidecarRule;
        let tracked = TrackingMap::new();

        rule.on_change(&tracked, &path, Instant::now());
        assert_eq!(rule.ready(&tracked, Instant::now()), vec![path]);
        Ok(())
    }

    #[test]
    fn sidecar_rule_ignores_marker_left_by_earlier_file() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let marker = write_file(workspace.path(), "x.csv.ok", b"")?;
        backdate(&marker, Duration::from_secs(60))?;
        // A new writer starts on the same name; its bytes are not complete yet.
        let path = write_file(workspace.path(), "x.csv", b"a,b\n")?;
        let rule = SidecarRule;
        let tracked = TrackingMap::new();
        let now = Instant::now();

        rule.on_change(&tracked, &path, now);
        assert_eq!(tracked.len(), 1);
        assert!(rule.ready(&tracked, now).is_empty());

        // Replaying the stale marker, as a rescan would, changes nothing.
        rule.on_change(&tracked, &marker, now);
        assert!(rule.ready(&tracked, now).is_empty());

        // The writer's own marker completes the file.
        let marker = write_file(workspace.path(), "x.csv.ok", b"done")?;
        rule.on_change(&tracked, &marker, now);
        assert_eq!(rule.ready(&tracked, now), vec![path]);
        Ok(())
    }

    #[test]
    fn sidecar_marker_without_target_is_ignored() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let marker = write_file(workspace.path(), "y.csv.ok", b"")?;
        let rule = SidecarRule;
        let tracked = TrackingMap::new();

        rule.on_change(&tracked, &marker, Instant::now());
        assert!(tracked.is_empty());
        Ok(())
    }

    #[test]
    fn rule_from_policy_selects_variant() {
        let window = Duration::from_secs(5);
        assert_eq!(
            Rule::from(CompletionPolicy::StabilityWindow { window }),
            Rule::Stability(StabilityRule::new(window))
        );
        assert_eq!(Rule::from(CompletionPolicy::Sidecar), Rule::Sidecar(SidecarRule));
    }
}
