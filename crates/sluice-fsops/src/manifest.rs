//! Append-only provenance manifest partitioned by UTC hour.
//!
//! # Design
//! - One JSON object per line under `<root>/YYYY/MM/DD/HH/manifest.jsonl`.
//! - Each append is a single buffered write followed by `fsync`.
//! - Appends to the same partition are serialised through a per-file lock so
//!   concurrent workers never interleave lines. Idle locks are pruned after
//!   each append, so the lock map only holds partitions being written.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{FsOpsError, FsOpsResult};

/// File name used inside every partition directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.jsonl";

/// One provenance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Hex SHA-256 of the content.
    pub digest: String,
    /// Original file name.
    pub name: String,
    /// Where the file was discovered.
    pub source_path: PathBuf,
    /// Where the file now lives.
    pub dest_path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// When ingestion completed.
    pub processed_at: DateTime<Utc>,
}

/// Appends manifest lines into hourly partitions.
#[derive(Debug)]
pub struct ManifestWriter {
    root: PathBuf,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl ManifestWriter {
    /// Writer rooted at `root`; directories are created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    /// Root directory of the manifest tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Partition file for a timestamp.
    #[must_use]
    pub fn partition_path(&self, at: DateTime<Utc>) -> PathBuf {
        self.root
            .join(at.format("%Y/%m/%d/%H").to_string())
            .join(MANIFEST_FILE_NAME)
    }

    /// Append `entry` to the partition for its `processed_at`, returning the file written.
    ///
    /// # Errors
    ///
    /// Returns an error when the entry cannot be serialised or the partition
    /// cannot be created, written or synced.
    pub fn append(&self, entry: &ManifestEntry) -> FsOpsResult<PathBuf> {
        let path = self.partition_path(entry.processed_at);
        let mut line = serde_json::to_vec(entry)
            .map_err(|source| FsOpsError::json("manifest.serialize", &path, source))?;
        line.push(b'\n');

        let lock = self
            .locks
            .entry(path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let written = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            write_line(&path, &line)
        };
        drop(lock);
        // Only the map still holds the lock when no other append is in flight.
        self.locks
            .remove_if(&path, |_, lock| Arc::strong_count(lock) == 1);
        written.map(|()| path)
    }
}

fn write_line(path: &Path, line: &[u8]) -> FsOpsResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|source| FsOpsError::io("manifest.create_dir", parent, source))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| FsOpsError::io("manifest.open", path, source))?;
    file.write_all(line)
        .map_err(|source| FsOpsError::io("manifest.write", path, source))?;
    file.sync_all()
        .map_err(|source| FsOpsError::io("manifest.fsync", path, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sluice_test_support::fixtures::temp_workspace;
    use std::thread;

    fn entry(name: &str, at: DateTime<Utc>) -> ManifestEntry {
        ManifestEntry {
            digest: format!("digest-{name}"),
            name: name.to_string(),
            source_path: PathBuf::from("/in").join(name),
            dest_path: PathBuf::from("/warehouse").join(name),
            size: 8,
            processed_at: at,
        }
    }

    fn at(hour: u32) -> anyhow::Result<DateTime<Utc>> {
        Utc.with_ymd_and_hms(2024, 1, 2, hour, 15, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("valid timestamp"))
    }

    #[test]
    fn partition_path_uses_utc_hour() -> anyhow::Result<()> {
        let writer = ManifestWriter::new("/manifests");
        assert_eq!(
            writer.partition_path(at(7)?),
            PathBuf::from("/manifests/2024/01/02/07/manifest.jsonl")
        );
        Ok(())
    }

    #[test]
    fn append_writes_one_line_per_entry() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let writer = ManifestWriter::new(workspace.path());
        let first = writer.append(&entry("x.csv", at(7)?))?;
        let second = writer.append(&entry("y.csv", at(7)?))?;
        assert_eq!(first, second);

        let contents = fs::read_to_string(&first)?;
        let lines: Vec<ManifestEntry> = contents
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(lines, vec![entry("x.csv", at(7)?), entry("y.csv", at(7)?)]);

        let other = writer.append(&entry("z.csv", at(8)?))?;
        assert_ne!(other, first);
        Ok(())
    }

    #[test]
    fn concurrent_appends_do_not_interleave() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let writer = Arc::new(ManifestWriter::new(workspace.path()));
        let stamp = at(9)?;
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let writer = Arc::clone(&writer);
                thread::spawn(move || -> FsOpsResult<()> {
                    for index in 0..25 {
                        writer.append(&entry(&format!("{worker}-{index}.csv"), stamp))?;
                    }
                    Ok(())
                })
            })
            .collect();
        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("writer thread panicked"))??;
        }

        let contents = fs::read_to_string(writer.partition_path(stamp))?;
        let mut count = 0;
        for line in contents.lines() {
            let parsed: ManifestEntry = serde_json::from_str(line)?;
            assert_eq!(parsed.size, 8);
            count += 1;
        }
        assert_eq!(count, 200);
        assert!(writer.locks.is_empty());
        Ok(())
    }

    #[test]
    fn partition_locks_are_released_after_append() -> anyhow::Result<()> {
        let workspace = temp_workspace()?;
        let writer = ManifestWriter::new(workspace.path());
        for hour in 0..24 {
            writer.append(&entry("x.csv", at(hour)?))?;
            assert!(writer.locks.is_empty());
        }
        Ok(())
    }
}
