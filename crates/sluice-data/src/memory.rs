//! In-process backend; not durable across restarts.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{DataError, DataResult};
use crate::store::{DedupStore, FileRecord, NewFileRecord, TransactionWork};

/// Dedup store backed by concurrent maps.
#[derive(Debug, Default)]
pub struct MemoryDedupStore {
    records: DashMap<String, FileRecord>,
    // Digests whose work is in flight; invisible to `exists` until committed.
    pending: DashMap<String, ()>,
    next_id: AtomicI64,
}

impl MemoryDedupStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record has been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Committed record for `digest`.
    #[must_use]
    pub fn get(&self, digest: &str) -> Option<FileRecord> {
        self.records.get(digest).map(|entry| entry.value().clone())
    }

    fn reserve(&self, digest: &str) -> DataResult<()> {
        match self.pending.entry(digest.to_string()) {
            Entry::Occupied(_) => return Err(duplicate(digest)),
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }
        // Commit inserts before releasing its reservation, so this check cannot miss it.
        if self.records.contains_key(digest) {
            self.pending.remove(digest);
            return Err(duplicate(digest));
        }
        Ok(())
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn exists(&self, digest: &str) -> DataResult<bool> {
        Ok(self.records.contains_key(digest))
    }

    async fn create_within_transaction(
        &self,
        record: NewFileRecord,
        work: TransactionWork,
    ) -> DataResult<()> {
        self.reserve(&record.digest)?;

        let outcome = match tokio::task::spawn_blocking(work).await {
            Ok(Ok(())) => {
                let committed = FileRecord {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                    digest: record.digest.clone(),
                    name: record.name,
                    source_path: record.source_path,
                    size: record.size,
                    created_at: Utc::now(),
                };
                self.records.insert(record.digest.clone(), committed);
                Ok(())
            }
            Ok(Err(source)) => Err(DataError::WorkFailed { source }),
            Err(_) => Err(DataError::WorkAborted),
        };
        self.pending.remove(&record.digest);
        outcome
    }
}

fn duplicate(digest: &str) -> DataError {
    DataError::DuplicateDigest {
        digest: digest.to_string(),
    }
}
