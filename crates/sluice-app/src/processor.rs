//! Per-tick ingest pipeline.
//!
//! # Design
//! - `run_once` snapshots the ready set and fans it out over at most `W` tasks,
//!   `W = clamp(concurrency, 1, ready)`, then waits for every task before returning.
//! - Hashing, moving and manifest writes run on the blocking pool; no lock is held
//!   across them. The store's unique digest is the only cross-worker exclusion.
//! - A path leaves tracking when it is ingested or fails to stat/hash. Duplicates
//!   and dry-run paths stay on disk and are settled, so rescans skip them until
//!   their size or mtime changes.
//! - Transaction failures keep the path tracked so the next tick retries it. If the
//!   move happened but the record was lost, the file is moved back first.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use sluice_config::DestinationLayout;
use sluice_data::{DataError, DedupStore, NewFileRecord, TransactionWork, WorkError};
use sluice_fsops::{
    Digest, FsOpsError, ManifestEntry, ManifestWriter, destination_for, digest_file, disambiguate,
    move_file,
};
use sluice_telemetry::{IngestOutcome, Metrics};
use sluice_watch::CompletionDetector;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};

/// Static settings for a processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorSettings {
    /// Watched input root; destinations mirror paths relative to it.
    pub input_root: PathBuf,
    /// Destination store root.
    pub destination_root: PathBuf,
    /// Destination partitioning.
    pub layout: DestinationLayout,
    /// Upper bound on parallel workers per tick.
    pub concurrency: usize,
    /// Log would-be actions instead of recording and moving.
    pub dry_run: bool,
}

/// Outcome counts for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Paths that were ready at the start of the tick.
    pub ready: usize,
    /// Workers used.
    pub workers: usize,
    /// Recorded and relocated.
    pub ingested: usize,
    /// Skipped because the content was already recorded.
    pub duplicates: usize,
    /// Logged only.
    pub dry_run: usize,
    /// Dropped after stat/hash failures.
    pub failed: usize,
    /// Left tracked for the next tick.
    pub retries: usize,
}

impl TickSummary {
    fn record(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Ingested => self.ingested += 1,
            IngestOutcome::Duplicate => self.duplicates += 1,
            IngestOutcome::DryRun => self.dry_run += 1,
            IngestOutcome::Failed => self.failed += 1,
            IngestOutcome::Retry => self.retries += 1,
        }
    }
}

/// What the blocking inspection step learns about a ready path.
#[derive(Debug)]
struct Inspected {
    size: u64,
    digest: Digest,
    destination: PathBuf,
}

/// Turns ready paths into recorded, relocated files.
#[derive(Clone)]
pub struct Processor {
    detector: Arc<CompletionDetector>,
    store: Arc<dyn DedupStore>,
    manifest: Arc<ManifestWriter>,
    metrics: Metrics,
    settings: Arc<ProcessorSettings>,
}

impl Processor {
    /// Assemble a processor from its collaborators.
    #[must_use]
    pub fn new(
        detector: Arc<CompletionDetector>,
        store: Arc<dyn DedupStore>,
        manifest: Arc<ManifestWriter>,
        metrics: Metrics,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            detector,
            store,
            manifest,
            metrics,
            settings: Arc::new(settings),
        }
    }

    /// Process every path that is ready now and wait for all of them.
    pub async fn run_once(&self) -> TickSummary {
        let started = Instant::now();
        let ready = self.detector.ready_paths();
        let mut summary = TickSummary {
            ready: ready.len(),
            ..TickSummary::default()
        };
        if ready.is_empty() {
            self.metrics.set_tracked_paths(self.detector.tracked_count());
            return summary;
        }

        let width = self.settings.concurrency.clamp(1, ready.len());
        summary.workers = width;
        debug!(ready = ready.len(), workers = width, "processing ready paths");

        let permits = Arc::new(Semaphore::new(width));
        let mut tasks = JoinSet::new();
        for path in ready {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let worker = self.clone();
            tasks.spawn(async move {
                let outcome = worker.process(&path).await;
                drop(permit);
                outcome
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|err| {
                error!(error = %err, "ingest worker failed");
                self.metrics.inc_outcome(IngestOutcome::Retry);
                IngestOutcome::Retry
            });
            summary.record(outcome);
        }

        self.metrics.set_tracked_paths(self.detector.tracked_count());
        self.metrics.observe_tick(started.elapsed());
        info!(
            ready = summary.ready,
            ingested = summary.ingested,
            duplicates = summary.duplicates,
            dry_run = summary.dry_run,
            failed = summary.failed,
            retries = summary.retries,
            "tick complete"
        );
        summary
    }

    async fn process(&self, path: &Path) -> IngestOutcome {
        let outcome = self.ingest(path).await;
        self.metrics.inc_outcome(outcome);
        outcome
    }

    async fn ingest(&self, path: &Path) -> IngestOutcome {
        let inspected = match self.inspect(path).await {
            Ok(inspected) => inspected,
            Err(err) => {
                warn!(path = %path.display(), error = ?err, "inspect failed; untracked");
                self.detector.untrack(path);
                return IngestOutcome::Failed;
            }
        };
        let Inspected {
            size,
            digest,
            destination,
        } = inspected;

        match self.store.exists(digest.as_str()).await {
            Ok(false) => {}
            Ok(true) => {
                info!(
                    path = %path.display(),
                    digest = %digest,
                    "duplicate content; source left in place"
                );
                self.settle(path);
                return IngestOutcome::Duplicate;
            }
            Err(err) => {
                warn!(path = %path.display(), digest = %digest, error = ?err, "dedup lookup failed");
                return IngestOutcome::Retry;
            }
        }

        if self.settings.dry_run {
            info!(
                path = %path.display(),
                digest = %digest,
                destination = %destination.display(),
                size,
                "dry run: would ingest"
            );
            self.settle(path);
            return IngestOutcome::DryRun;
        }

        let record = NewFileRecord {
            digest: digest.to_string(),
            name: file_name(path),
            source_path: path.to_path_buf(),
            size,
        };
        let work = relocation(path.to_path_buf(), destination.clone());
        match self.store.create_within_transaction(record, work).await {
            Ok(()) => {}
            Err(DataError::DuplicateDigest { .. }) => {
                info!(
                    path = %path.display(),
                    digest = %digest,
                    "digest recorded concurrently; retrying next tick"
                );
                return IngestOutcome::Retry;
            }
            Err(err) if err.work_applied() => {
                return self.undo_relocation(path, &destination, &err).await;
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    digest = %digest,
                    destination = %destination.display(),
                    error = ?err,
                    "ingest transaction failed; retrying next tick"
                );
                return IngestOutcome::Retry;
            }
        }

        let entry = ManifestEntry {
            digest: digest.into_string(),
            name: file_name(path),
            source_path: path.to_path_buf(),
            dest_path: destination.clone(),
            size,
            processed_at: Utc::now(),
        };
        self.append_manifest(entry).await;

        self.detector.untrack(path);
        self.metrics.add_ingested_bytes(size);
        info!(
            path = %path.display(),
            destination = %destination.display(),
            size,
            "ingested"
        );
        IngestOutcome::Ingested
    }

    async fn inspect(&self, path: &Path) -> AppResult<Inspected> {
        let path = path.to_path_buf();
        let settings = Arc::clone(&self.settings);
        tokio::task::spawn_blocking(move || inspect_blocking(&path, &settings))
            .await
            .map_err(|err| AppError::join("inspect", err))?
    }

    /// The file moved but its record was lost: move it back so the next tick retries.
    async fn undo_relocation(
        &self,
        path: &Path,
        destination: &Path,
        cause: &DataError,
    ) -> IngestOutcome {
        let source = path.to_path_buf();
        let moved = destination.to_path_buf();
        let restored = tokio::task::spawn_blocking(move || move_file(&moved, &source)).await;
        match restored {
            Ok(Ok(_)) => {
                warn!(
                    path = %path.display(),
                    destination = %destination.display(),
                    error = ?cause,
                    "record not committed; relocation undone, retrying next tick"
                );
                IngestOutcome::Retry
            }
            Ok(Err(err)) => {
                error!(
                    path = %path.display(),
                    destination = %destination.display(),
                    error = ?err,
                    cause = ?cause,
                    "relocated without a record and could not be moved back"
                );
                self.detector.untrack(path);
                IngestOutcome::Failed
            }
            Err(err) => {
                error!(
                    path = %path.display(),
                    destination = %destination.display(),
                    error = %err,
                    cause = ?cause,
                    "relocated without a record; undo aborted"
                );
                self.detector.untrack(path);
                IngestOutcome::Failed
            }
        }
    }

    /// Park a source left in place so rescans skip it until it changes.
    fn settle(&self, path: &Path) {
        if !self.detector.settle(path) {
            debug!(path = %path.display(), "source vanished before it could be settled");
        }
    }

    async fn append_manifest(&self, entry: ManifestEntry) {
        let manifest = Arc::clone(&self.manifest);
        let source = entry.source_path.clone();
        match tokio::task::spawn_blocking(move || manifest.append(&entry)).await {
            Ok(Ok(partition)) => {
                debug!(path = %source.display(), manifest = %partition.display(), "manifest appended");
            }
            Ok(Err(err)) => {
                warn!(path = %source.display(), error = ?err, "manifest append failed");
            }
            Err(err) => {
                warn!(path = %source.display(), error = %err, "manifest append aborted");
            }
        }
    }
}

fn inspect_blocking(path: &Path, settings: &ProcessorSettings) -> AppResult<Inspected> {
    let metadata = fs::metadata(path).map_err(|source| AppError::io("inspect.stat", path, source))?;
    if !metadata.is_file() {
        return Err(AppError::fsops(
            "inspect.stat",
            FsOpsError::NotRegularFile {
                path: path.to_path_buf(),
            },
        ));
    }
    let digest = digest_file(path).map_err(|err| AppError::fsops("inspect.hash", err))?;

    let partition = match settings.layout {
        DestinationLayout::Mirror => None,
        DestinationLayout::IngestDate => Some(Utc::now()),
    };
    let mut destination = destination_for(
        &settings.input_root,
        &settings.destination_root,
        path,
        partition,
    )
    .map_err(|err| AppError::fsops("inspect.destination", err))?;
    if fs::symlink_metadata(&destination).is_ok() {
        destination = disambiguate(&destination, &digest);
    }

    Ok(Inspected {
        size: metadata.len(),
        digest,
        destination,
    })
}

/// Work run inside the store transaction: create the destination directory and move.
fn relocation(source: PathBuf, destination: PathBuf) -> TransactionWork {
    Box::new(move || -> Result<(), WorkError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        match move_file(&source, &destination) {
            Ok(strategy) => {
                debug!(
                    path = %source.display(),
                    destination = %destination.display(),
                    ?strategy,
                    "relocated"
                );
                Ok(())
            }
            Err(err) if err.is_cleanup_only() => {
                warn!(
                    path = %source.display(),
                    destination = %destination.display(),
                    error = ?err,
                    "copied, but the source could not be removed"
                );
                Ok(())
            }
            Err(err) => Err(Box::new(err)),
        }
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
