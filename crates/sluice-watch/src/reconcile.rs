//! Directory scan that re-arms files notifications never reported.
//!
//! Files present before startup, or missed while the watcher was down, produce
//! no events. The scan feeds a synthetic `Created` for each regular file,
//! files first and markers last so a marker never precedes its target.

use std::path::PathBuf;

use sluice_fsops::is_sidecar_marker;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::detector::CompletionDetector;
use crate::error::{WatchError, WatchResult};
use crate::event::FsEvent;

/// Counts from one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Regular files fed to the detector.
    pub files: usize,
    /// Marker files fed after them.
    pub markers: usize,
    /// Entries skipped because they could not be read.
    pub skipped: usize,
}

/// Scans the detector's root.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler;

impl Reconciler {
    /// Walk the input root (one level unless recursive) and re-arm every regular file.
    ///
    /// # Errors
    ///
    /// Returns an error when the root itself cannot be read.
    pub fn scan(detector: &CompletionDetector) -> WatchResult<ReconcileSummary> {
        let root = detector.root();
        let max_depth = if detector.recursive() { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = Vec::new();
        let mut markers: Vec<PathBuf> = Vec::new();
        let mut summary = ReconcileSummary::default();

        for entry in WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) if source.depth() == 0 => {
                    return Err(WatchError::Walk {
                        path: root.to_path_buf(),
                        source,
                    });
                }
                Err(err) => {
                    warn!(path = ?err.path(), error = %err, "skipping unreadable entry");
                    summary.skipped += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if is_sidecar_marker(&path) {
                markers.push(path);
            } else {
                files.push(path);
            }
        }

        for path in &files {
            detector.observe(&FsEvent::created(path));
        }
        for path in &markers {
            detector.observe(&FsEvent::created(path));
        }
        summary.files = files.len();
        summary.markers = markers.len();

        info!(
            root = %root.display(),
            files = summary.files,
            markers = summary.markers,
            skipped = summary.skipped,
            tracked = detector.tracked_count(),
            "reconciled input"
        );
        Ok(summary)
    }
}
