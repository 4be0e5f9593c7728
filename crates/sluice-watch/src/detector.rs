//! Completion detector: owns the tracking map and the notification consumer.
//!
//! # Design
//! - One dedicated thread drains notify events and folds them into the map.
//! - The processor reads ready paths and untracks finished ones concurrently;
//!   the map is sharded, so neither side blocks on the other's I/O.
//! - Stopping drops the watcher, which closes the channel and ends the thread.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use sluice_config::CompletionPolicy;
use sluice_fsops::sidecar_target;
use tracing::{debug, info, warn};

use crate::error::{WatchError, WatchResult};
use crate::event::{FsEvent, FsEventKind, translate};
use crate::rules::{CompletionRule, Rule, TrackingMap};
use crate::tracking::{SettledPaths, TrackedPath};

struct Shared {
    tracked: TrackingMap,
    settled: SettledPaths,
    rule: Rule,
}

impl Shared {
    fn apply(&self, event: &FsEvent, now: Instant) {
        match event.kind {
            FsEventKind::Created | FsEventKind::Modified => {
                // A marker event is about its target.
                let subject = sidecar_target(&event.path);
                let subject = subject.as_deref().unwrap_or(&event.path);
                if self.settled.holds(subject) {
                    debug!(path = %subject.display(), "settled and unchanged; ignored");
                    return;
                }
                self.rule.on_change(&self.tracked, &event.path, now);
            }
            FsEventKind::Removed => {
                self.settled.release(&event.path);
                if self.tracked.remove(&event.path).is_some() {
                    debug!(path = %event.path.display(), "removed; untracked");
                }
            }
        }
    }
}

struct Running {
    watcher: RecommendedWatcher,
    consumer: JoinHandle<()>,
}

/// Tracks files under the input root and reports which are complete.
pub struct CompletionDetector {
    root: PathBuf,
    recursive: bool,
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl CompletionDetector {
    /// Detector for `root` applying `policy`. Nothing is watched until [`Self::start`].
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, policy: CompletionPolicy, recursive: bool) -> Self {
        Self {
            root: root.into(),
            recursive,
            shared: Arc::new(Shared {
                tracked: TrackingMap::new(),
                settled: SettledPaths::default(),
                rule: Rule::from(policy),
            }),
            running: Mutex::new(None),
        }
    }

    /// Watched root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether subdirectories are watched.
    #[must_use]
    pub const fn recursive(&self) -> bool {
        self.recursive
    }

    /// Begin watching the root and consuming notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the detector is already running, the backend cannot
    /// watch the root, or the consumer thread cannot be spawned.
    pub fn start(&self) -> WatchResult<()> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Err(WatchError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |result| {
            // The receiver is gone only while stopping.
            let _ = tx.send(result);
        })
        .map_err(|source| WatchError::Notify {
            operation: "watcher.create",
            path: self.root.clone(),
            source,
        })?;

        let mode = if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher
            .watch(&self.root, mode)
            .map_err(|source| WatchError::Notify {
                operation: "watcher.watch",
                path: self.root.clone(),
                source,
            })?;

        let shared = Arc::clone(&self.shared);
        let consumer = thread::Builder::new()
            .name("sluice-watch".into())
            .spawn(move || consume(&shared, &rx))
            .map_err(|source| WatchError::Spawn { source })?;

        info!(root = %self.root.display(), recursive = self.recursive, "watching input");
        *running = Some(Running { watcher, consumer });
        Ok(())
    }

    /// Stop watching and wait for the consumer thread to drain.
    pub fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Running { watcher, consumer }) = running {
            drop(watcher);
            if consumer.join().is_err() {
                warn!("watch consumer panicked");
            }
            info!(root = %self.root.display(), "stopped watching input");
        }
    }

    /// Fold one event into the tracking state.
    pub fn observe(&self, event: &FsEvent) {
        self.observe_at(event, Instant::now());
    }

    /// Fold one event into the tracking state as of `now`.
    pub fn observe_at(&self, event: &FsEvent, now: Instant) {
        self.shared.apply(event, now);
    }

    /// Paths ready for processing, sorted.
    #[must_use]
    pub fn ready_paths(&self) -> Vec<PathBuf> {
        self.ready_paths_at(Instant::now())
    }

    /// Paths ready for processing as of `now`, sorted.
    #[must_use]
    pub fn ready_paths_at(&self, now: Instant) -> Vec<PathBuf> {
        self.shared.rule.ready(&self.shared.tracked, now)
    }

    /// Forget `path`. Returns whether it was tracked.
    pub fn untrack(&self, path: &Path) -> bool {
        self.shared.tracked.remove(path).is_some()
    }

    /// Forget `path` and ignore further events for it until its size or mtime changes.
    ///
    /// Used for sources left in place, such as duplicates, so rescans do not
    /// re-arm them. Returns whether the path could be recorded.
    pub fn settle(&self, path: &Path) -> bool {
        self.shared.tracked.remove(path);
        self.shared.settled.settle(path)
    }

    /// Whether `path` is settled and unchanged.
    #[must_use]
    pub fn is_settled(&self, path: &Path) -> bool {
        self.shared.settled.holds(path)
    }

    /// Number of tracked paths.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.shared.tracked.len()
    }

    /// Tracking entry for `path`, if any.
    #[must_use]
    pub fn tracked(&self, path: &Path) -> Option<TrackedPath> {
        self.shared.tracked.get(path).map(|entry| entry.value().clone())
    }
}

impl Drop for CompletionDetector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn consume(shared: &Shared, rx: &Receiver<notify::Result<notify::Event>>) {
    for result in rx {
        match result {
            Ok(event) => {
                let now = Instant::now();
                for fs_event in translate(event) {
                    shared.apply(&fs_event, now);
                }
            }
            Err(err) => warn!(error = %err, paths = ?err.paths, "watch backend error"),
        }
    }
    debug!("watch consumer exiting");
}
