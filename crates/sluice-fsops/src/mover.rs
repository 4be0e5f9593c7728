//! Atomic relocation of a file into the destination store.
//!
//! # Design
//! - Prefer a single `rename`; it is atomic on the same filesystem.
//! - On a cross-device error, copy into a hidden temp file beside the destination,
//!   fsync it, rename it into place, fsync the directory and only then unlink the source.
//! - The destination never exposes a partially written file under its final name.
//! - A failed unlink after the destination is durable surfaces as `SourceCleanup`.

use std::fs::{self, File, Metadata};
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{FsOpsError, FsOpsResult};

const TEMP_SUFFIX: &str = ".sluice-partial";

/// How a move was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStrategy {
    /// Single same-filesystem rename.
    Renamed,
    /// Copy + fsync + rename fallback across filesystems.
    Copied,
}

/// Filesystem operations the mover depends on, injectable for fault testing.
pub trait FileOps: Send + Sync {
    /// Rename `from` to `to`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying rename failure.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Copy the full contents of `from` into `to`.
    ///
    /// # Errors
    ///
    /// Propagates read or write failures.
    fn copy(&self, from: &Path, to: &mut File) -> io::Result<u64>;

    /// Remove `path`.
    ///
    /// # Errors
    ///
    /// Propagates the underlying unlink failure.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Passthrough to `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn copy(&self, from: &Path, to: &mut File) -> io::Result<u64> {
        let mut source = File::open(from)?;
        io::copy(&mut source, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Mover parameterised over its filesystem operations.
#[derive(Debug, Clone, Default)]
pub struct AtomicMover<F = StdFileOps> {
    ops: F,
}

impl<F: FileOps> AtomicMover<F> {
    /// Build a mover over `ops`.
    #[must_use]
    pub const fn new(ops: F) -> Self {
        Self { ops }
    }

    /// Move `src` to `dst`. The destination's parent directory must already exist.
    ///
    /// # Errors
    ///
    /// - `NotRegularFile` when `src` is not a regular file.
    /// - `Io` when the move did not happen; `src` is intact and `dst` is absent.
    /// - `SourceCleanup` when `dst` is durable but `src` could not be removed.
    pub fn move_file(&self, src: &Path, dst: &Path) -> FsOpsResult<MoveStrategy> {
        let metadata =
            fs::symlink_metadata(src).map_err(|source| FsOpsError::io("move.stat", src, source))?;
        if !metadata.is_file() {
            return Err(FsOpsError::NotRegularFile {
                path: src.to_path_buf(),
            });
        }

        match self.ops.rename(src, dst) {
            Ok(()) => Ok(MoveStrategy::Renamed),
            Err(err) if is_cross_device(&err) => {
                debug!(src = %src.display(), dst = %dst.display(), "rename crossed devices; copying");
                self.copy_across(src, dst, &metadata)?;
                Ok(MoveStrategy::Copied)
            }
            Err(source) => Err(FsOpsError::io("move.rename", src, source)),
        }
    }

    fn copy_across(&self, src: &Path, dst: &Path, metadata: &Metadata) -> FsOpsResult<()> {
        let parent = dst.parent().unwrap_or_else(|| Path::new("."));
        let file_name = dst
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        // Temp file is removed on drop if any step below fails.
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(TEMP_SUFFIX)
            .tempfile_in(parent)
            .map_err(|source| FsOpsError::io("move.temp_create", parent, source))?;

        self.ops
            .copy(src, temp.as_file_mut())
            .map_err(|source| FsOpsError::io("move.copy", src, source))?;
        temp.as_file()
            .sync_all()
            .map_err(|source| FsOpsError::io("move.fsync", temp.path(), source))?;

        preserve_attributes(temp.path(), metadata);

        let temp_path = temp.into_temp_path();
        self.ops
            .rename(&temp_path, dst)
            .map_err(|source| FsOpsError::io("move.persist", dst, source))?;
        // The temp name no longer exists; forget it rather than unlink on drop.
        temp_path.keep().map_err(|err| FsOpsError::io("move.persist", dst, err.error))?;

        sync_dir(parent);

        self.ops
            .remove(src)
            .map_err(|source| FsOpsError::SourceCleanup {
                path: src.to_path_buf(),
                destination: dst.to_path_buf(),
                source,
            })
    }
}

/// Move `src` to `dst` using the real filesystem.
///
/// # Errors
///
/// See [`AtomicMover::move_file`].
pub fn move_file(src: &Path, dst: &Path) -> FsOpsResult<MoveStrategy> {
    AtomicMover::new(StdFileOps).move_file(src, dst)
}

fn is_cross_device(err: &io::Error) -> bool {
    #[cfg(unix)]
    if err.raw_os_error() == Some(nix::errno::Errno::EXDEV as i32) {
        return true;
    }
    err.kind() == io::ErrorKind::CrossesDevices
}

fn preserve_attributes(path: &Path, metadata: &Metadata) {
    if let Err(err) = fs::set_permissions(path, metadata.permissions()) {
        warn!(path = %path.display(), error = %err, "failed to copy permissions");
    }
    #[cfg(unix)]
    {
        use nix::unistd::{Gid, Uid, chown};
        use std::os::unix::fs::MetadataExt;

        // Unprivileged processes usually cannot chown; the copy keeps our ownership then.
        if let Err(err) = chown(
            path,
            Some(Uid::from_raw(metadata.uid())),
            Some(Gid::from_raw(metadata.gid())),
        ) {
            debug!(path = %path.display(), error = %err, "ownership not preserved");
        }
    }
}

fn sync_dir(dir: &Path) {
    if let Err(err) = File::open(dir).and_then(|handle| handle.sync_all()) {
        warn!(dir = %dir.display(), error = %err, "failed to fsync directory");
    }
}
