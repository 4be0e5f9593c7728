//! Error types for the dedup store.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

/// Boxed failure returned by work run inside a store transaction.
pub type WorkError = Box<dyn Error + Send + Sync + 'static>;

/// Result alias for dedup store operations.
pub type DataResult<T> = std::result::Result<T, DataError>;

/// Errors raised by the dedup store.
#[derive(Debug)]
pub enum DataError {
    /// Migration execution failed.
    MigrationFailed {
        /// Underlying migration error.
        source: sqlx::migrate::MigrateError,
    },
    /// Opening the backing database failed.
    OpenFailed {
        /// Database path.
        path: PathBuf,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// A database operation failed.
    QueryFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// A record for the digest already exists.
    DuplicateDigest {
        /// Digest that was rejected.
        digest: String,
    },
    /// Work executed inside a transaction failed; nothing was committed.
    WorkFailed {
        /// Failure reported by the work.
        source: WorkError,
    },
    /// Work executed inside a transaction panicked or was cancelled.
    WorkAborted,
    /// Work completed but the record could not be committed.
    ///
    /// Whatever the work changed is in place with no record behind it; the caller
    /// must undo it or report it.
    CommitFailed {
        /// Digest whose record was lost.
        digest: String,
        /// Underlying SQL error.
        source: sqlx::Error,
    },
    /// A path could not be represented as UTF-8.
    PathNotUtf8 {
        /// Field name that contained the invalid path.
        field: &'static str,
        /// Path value.
        path: PathBuf,
    },
}

impl DataError {
    /// Whether the error is a lost uniqueness race on the digest.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateDigest { .. })
    }

    /// Whether the transactional work ran to completion without its record.
    #[must_use]
    pub const fn work_applied(&self) -> bool {
        matches!(self, Self::CommitFailed { .. })
    }
}

impl Display for DataError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MigrationFailed { .. } => formatter.write_str("migration failed"),
            Self::OpenFailed { .. } => formatter.write_str("failed to open dedup store"),
            Self::QueryFailed { .. } => formatter.write_str("database operation failed"),
            Self::DuplicateDigest { .. } => formatter.write_str("digest already recorded"),
            Self::WorkFailed { .. } => formatter.write_str("transaction work failed"),
            Self::WorkAborted => formatter.write_str("transaction work aborted"),
            Self::CommitFailed { .. } => {
                formatter.write_str("transaction commit failed after work completed")
            }
            Self::PathNotUtf8 { .. } => formatter.write_str("path contained invalid utf-8"),
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MigrationFailed { source } => Some(source),
            Self::OpenFailed { source, .. }
            | Self::QueryFailed { source, .. }
            | Self::CommitFailed { source, .. } => Some(source),
            Self::WorkFailed { source } => Some(source.as_ref()),
            Self::DuplicateDigest { .. } | Self::WorkAborted | Self::PathNotUtf8 { .. } => None,
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(source: sqlx::Error) -> Self {
        Self::QueryFailed {
            operation: "sqlx operation",
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn data_error_display_and_source() {
        let migration = DataError::MigrationFailed {
            source: sqlx::migrate::MigrateError::VersionMissing(1),
        };
        assert_eq!(migration.to_string(), "migration failed");
        assert!(migration.source().is_some());

        let query = DataError::QueryFailed {
            operation: "exists",
            source: sqlx::Error::RowNotFound,
        };
        assert_eq!(query.to_string(), "database operation failed");
        assert!(query.source().is_some());

        let duplicate = DataError::DuplicateDigest {
            digest: "abc".to_string(),
        };
        assert!(duplicate.is_duplicate());
        assert!(duplicate.source().is_none());

        let work = DataError::WorkFailed {
            source: Box::new(io::Error::other("move failed")),
        };
        assert_eq!(work.to_string(), "transaction work failed");
        assert!(work.source().is_some());
        assert!(!work.is_duplicate());

        let path = DataError::PathNotUtf8 {
            field: "source_path",
            path: PathBuf::from("in/x.csv"),
        };
        assert_eq!(path.to_string(), "path contained invalid utf-8");

        let commit = DataError::CommitFailed {
            digest: "abc".to_string(),
            source: sqlx::Error::PoolClosed,
        };
        assert!(commit.work_applied());
        assert!(!work.work_applied());
        assert!(commit.source().is_some());

        let from = DataError::from(sqlx::Error::RowNotFound);
        assert!(matches!(from, DataError::QueryFailed { .. }));
    }
}
