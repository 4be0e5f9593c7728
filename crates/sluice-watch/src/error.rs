//! # Design
//!
//! - Constant messages; the watched path and operation travel as fields.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for watch operations.
pub type WatchResult<T> = Result<T, WatchError>;

/// Errors raised while watching or scanning the input directory.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The notification backend failed.
    #[error("watch backend failure")]
    Notify {
        /// Operation that failed.
        operation: &'static str,
        /// Watched path.
        path: PathBuf,
        /// Underlying notify error.
        source: notify::Error,
    },
    /// Walking the input tree failed.
    #[error("input scan failed")]
    Walk {
        /// Root being scanned.
        path: PathBuf,
        /// Underlying walk error.
        source: walkdir::Error,
    },
    /// The consumer thread could not be spawned.
    #[error("failed to spawn watch consumer")]
    Spawn {
        /// Underlying IO error.
        source: io::Error,
    },
    /// `start` was called on a detector that is already running.
    #[error("detector already started")]
    AlreadyStarted,
}
