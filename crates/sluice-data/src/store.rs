//! Store interface shared by every dedup backend.
//!
//! # Design
//! - Two operations only: existence check and create-within-transaction.
//! - Uniqueness of the digest is enforced by the backend, never by the caller.
//! - The transactional work is synchronous filesystem code; backends run it off
//!   the async executor.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{DataError, DataResult, WorkError};

/// Relocation work executed inside a store transaction.
pub type TransactionWork = Box<dyn FnOnce() -> Result<(), WorkError> + Send + 'static>;

/// Fields supplied when recording a new digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileRecord {
    /// Hex content digest.
    pub digest: String,
    /// Original file name.
    pub name: String,
    /// Path the file was discovered at.
    pub source_path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

impl NewFileRecord {
    pub(crate) fn source_path_str(&self) -> DataResult<&str> {
        self.source_path
            .to_str()
            .ok_or_else(|| DataError::PathNotUtf8 {
                field: "source_path",
                path: self.source_path.clone(),
            })
    }
}

/// Persisted record for a digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Row identifier.
    pub id: i64,
    /// Hex content digest.
    pub digest: String,
    /// Original file name.
    pub name: String,
    /// Path the file was discovered at.
    pub source_path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

/// Durable record of every content digest ever ingested.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Whether a record exists for `digest`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be queried.
    async fn exists(&self, digest: &str) -> DataResult<bool>;

    /// Create `record` and run `work` as one unit.
    ///
    /// The record is durable only if `work` succeeds. A concurrent insert of the
    /// same digest fails with [`DataError::DuplicateDigest`] and `work` never runs.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDigest`, `WorkFailed`, `WorkAborted` or a backend error.
    /// `CommitFailed` means `work` completed but the record was not kept.
    async fn create_within_transaction(
        &self,
        record: NewFileRecord,
        work: TransactionWork,
    ) -> DataResult<()>;
}
