//! Destination path computation.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{FsOpsError, FsOpsResult};
use crate::hasher::Digest;

/// Number of digest characters spliced into a disambiguated filename.
const DIGEST_PREFIX_LEN: usize = 12;

/// Destination for `source` under `destination_root`.
///
/// With `date_partition` unset the path relative to `input_root` is mirrored;
/// otherwise it is placed under `ingest_date=YYYY-MM-DD/` for `ingested_at`.
///
/// # Errors
///
/// Returns `InvalidInput` when `source` has no usable relative path.
pub fn destination_for(
    input_root: &Path,
    destination_root: &Path,
    source: &Path,
    date_partition: Option<DateTime<Utc>>,
) -> FsOpsResult<PathBuf> {
    let relative = match source.strip_prefix(input_root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => source
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| invalid_source(source))?,
    };
    if relative.as_os_str().is_empty()
        || relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(invalid_source(source));
    }

    let mut destination = destination_root.to_path_buf();
    if let Some(at) = date_partition {
        destination.push(format!("ingest_date={}", at.format("%Y-%m-%d")));
    }
    destination.push(relative);
    Ok(destination)
}

/// Splice a digest prefix into the filename: `x.csv` -> `x.<digest12>.csv`.
#[must_use]
pub fn disambiguate(path: &Path, digest: &Digest) -> PathBuf {
    let tag = digest.short(DIGEST_PREFIX_LEN);
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{tag}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{tag}"),
    };
    path.with_file_name(name)
}

fn invalid_source(source: &Path) -> FsOpsError {
    FsOpsError::InvalidInput {
        field: "source",
        reason: "no_relative_path",
        value: Some(source.display().to_string()),
    }
}
