//! Temporary workspace and file fixtures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use filetime::FileTime;
use tempfile::TempDir;

/// Create a fresh temporary directory removed on drop.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn temp_workspace() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("sluice-")
        .tempdir()
        .context("failed to create temporary workspace")
}

/// Layout used by pipeline tests: `input/`, `warehouse/`, `manifests/` and a state file.
#[derive(Debug)]
pub struct IngestDirs {
    /// Owning temp directory.
    pub root: TempDir,
    /// Watched input directory.
    pub input: PathBuf,
    /// Destination store.
    pub destination: PathBuf,
    /// Manifest root.
    pub manifests: PathBuf,
    /// Dedup store database path.
    pub store: PathBuf,
}

impl IngestDirs {
    /// Create the directory layout; destination and manifests are left for the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the input directory cannot be created.
    pub fn new() -> Result<Self> {
        let root = temp_workspace()?;
        let input = root.path().join("input");
        fs::create_dir_all(&input).context("failed to create input directory")?;
        Ok(Self {
            destination: root.path().join("warehouse"),
            manifests: root.path().join("manifests"),
            store: root.path().join("sluice.db"),
            input,
            root,
        })
    }
}

/// Write `contents` to `dir/relative`, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file or its parents cannot be written.
pub fn write_file(dir: &Path, relative: &str, contents: &[u8]) -> Result<PathBuf> {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Set a file's modification time.
///
/// # Errors
///
/// Returns an error if the timestamp cannot be applied.
pub fn set_mtime(path: &Path, when: SystemTime) -> Result<()> {
    filetime::set_file_mtime(path, FileTime::from_system_time(when))
        .with_context(|| format!("failed to set mtime on {}", path.display()))
}

/// Push a file's modification time `age` into the past.
///
/// # Errors
///
/// Returns an error if the timestamp cannot be applied.
pub fn backdate(path: &Path, age: Duration) -> Result<()> {
    let when = SystemTime::now()
        .checked_sub(age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    set_mtime(path, when)
}

/// Sorted file names directly inside `dir`; empty when the directory is missing.
///
/// # Errors
///
/// Returns an error if an entry cannot be read.
pub fn list_names(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
