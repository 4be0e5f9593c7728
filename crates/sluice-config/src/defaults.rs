//! Default locations and tuning values for the ingestor.
//!
//! # Design
//! - Centralize defaults so the CLI and tests agree on a single baseline.
//! - Keep time-based defaults explicit for auditability.

/// Directory watched for dropped files.
pub const INPUT_ROOT: &str = "files";
/// Directory receiving relocated files.
pub const DESTINATION_ROOT: &str = "warehouse";
/// Directory receiving the partitioned manifest log.
pub const MANIFEST_ROOT: &str = "manifests";
/// `SQLite` file backing the dedup store.
pub const STORE_PATH: &str = "sluice.db";
/// Completion method used when none is configured.
pub const METHOD: &str = METHOD_SIDECAR;
/// Method name selecting the stability-window policy.
pub const METHOD_STABILITY_WINDOW: &str = "stability_window";
/// Method name selecting the sidecar-marker policy.
pub const METHOD_SIDECAR: &str = "sidecar";
/// Seconds of unchanged size/mtime before a file counts as complete.
pub const STABILITY_SECONDS: u64 = 10;
/// Worker pool width.
pub const CONCURRENCY: usize = 1;
/// Interval between processor passes, in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 1_000;
/// Upper bound accepted for the worker pool width.
pub const MAX_CONCURRENCY: usize = 256;
