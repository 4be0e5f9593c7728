//! Embedded `SQLite` backend.
//!
//! # Design
//! - One database file; WAL journal with `synchronous = FULL` so a committed
//!   record survives power loss.
//! - The `UNIQUE` index on `digest` is the only cross-worker exclusion on content.
//! - Uncommitted rows are invisible to other pool connections, so `exists` never
//!   reports a digest whose relocation may still roll back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{FromRow, Sqlite, Transaction};
use tracing::{debug, error, info, warn};

use crate::error::{DataError, DataResult};
use crate::store::{DedupStore, FileRecord, NewFileRecord, TransactionWork};

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const INSERT_FILE: &str = r"
    INSERT INTO ingested_files (digest, name, source_path, size, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
";

const EXISTS_FILE: &str =
    r"SELECT EXISTS(SELECT 1 FROM ingested_files WHERE digest = ?1)";

const SELECT_FILE: &str = r"
    SELECT id, digest, name, source_path, size, created_at
    FROM ingested_files
    WHERE digest = ?1
";

const COUNT_FILES: &str = r"SELECT COUNT(*) FROM ingested_files";

#[derive(Debug, FromRow)]
struct FileRow {
    id: i64,
    digest: String,
    name: String,
    source_path: String,
    size: i64,
    created_at: DateTime<Utc>,
}

impl From<FileRow> for FileRecord {
    fn from(row: FileRow) -> Self {
        Self {
            id: row.id,
            digest: row.digest,
            name: row.name,
            source_path: PathBuf::from(row.source_path),
            size: u64::try_from(row.size).unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

/// Dedup store persisted in a single `SQLite` file.
#[derive(Clone, Debug)]
pub struct SqliteDedupStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteDedupStore {
    /// Open (creating if absent) the store at `path` and apply migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open(path: impl AsRef<Path>) -> DataResult<Self> {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|source| DataError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|source| DataError::MigrationFailed { source })?;

        info!(path = %path.display(), "dedup store opened");
        Ok(Self { pool, path })
    }

    /// Location of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a record outside of any relocation work.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDigest` when the digest is already recorded.
    pub async fn create(&self, record: NewFileRecord) -> DataResult<()> {
        let mut tx = self.begin().await?;
        insert(&mut tx, &record).await?;
        tx.commit().await.map_err(|source| DataError::QueryFailed {
            operation: "create.commit",
            source,
        })
    }

    /// Fetch the record for `digest`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error when the query fails.
    pub async fn find(&self, digest: &str) -> DataResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(SELECT_FILE)
            .bind(digest)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| DataError::QueryFailed {
                operation: "find",
                source,
            })?;
        Ok(row.map(FileRecord::from))
    }

    /// Number of recorded digests.
    ///
    /// # Errors
    ///
    /// Returns an error when the query fails.
    pub async fn count(&self) -> DataResult<u64> {
        let count: i64 = sqlx::query_scalar(COUNT_FILES)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| DataError::QueryFailed {
                operation: "count",
                source,
            })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!(path = %self.path.display(), "dedup store closed");
    }

    async fn begin(&self) -> DataResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|source| DataError::QueryFailed {
                operation: "begin",
                source,
            })
    }
}

#[async_trait]
impl DedupStore for SqliteDedupStore {
    async fn exists(&self, digest: &str) -> DataResult<bool> {
        let found: i64 = sqlx::query_scalar(EXISTS_FILE)
            .bind(digest)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| DataError::QueryFailed {
                operation: "exists",
                source,
            })?;
        Ok(found != 0)
    }

    async fn create_within_transaction(
        &self,
        record: NewFileRecord,
        work: TransactionWork,
    ) -> DataResult<()> {
        let mut tx = self.begin().await?;
        // Dropping the transaction on early return rolls it back.
        insert(&mut tx, &record).await?;

        match tokio::task::spawn_blocking(work).await {
            Ok(Ok(())) => {
                tx.commit().await.map_err(|source| {
                    error!(digest = %record.digest, error = %source, "commit failed after work completed");
                    DataError::CommitFailed {
                        digest: record.digest.clone(),
                        source,
                    }
                })?;
                debug!(digest = %record.digest, "record committed");
                Ok(())
            }
            Ok(Err(source)) => {
                rollback(tx, &record.digest).await;
                Err(DataError::WorkFailed { source })
            }
            Err(err) => {
                warn!(digest = %record.digest, error = %err, "transaction work aborted");
                rollback(tx, &record.digest).await;
                Err(DataError::WorkAborted)
            }
        }
    }
}

async fn insert(tx: &mut Transaction<'static, Sqlite>, record: &NewFileRecord) -> DataResult<()> {
    let source_path = record.source_path_str()?;
    let size = i64::try_from(record.size).unwrap_or(i64::MAX);
    sqlx::query(INSERT_FILE)
        .bind(&record.digest)
        .bind(&record.name)
        .bind(source_path)
        .bind(size)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .map_err(|source| {
            if source
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                DataError::DuplicateDigest {
                    digest: record.digest.clone(),
                }
            } else {
                DataError::QueryFailed {
                    operation: "insert",
                    source,
                }
            }
        })?;
    Ok(())
}

async fn rollback(tx: Transaction<'static, Sqlite>, digest: &str) {
    if let Err(err) = tx.rollback().await {
        warn!(digest, error = %err, "transaction rollback failed");
    }
}
