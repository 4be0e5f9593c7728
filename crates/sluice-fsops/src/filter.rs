//! Candidate filtering for discovered paths.

use std::path::{Path, PathBuf};

/// Suffix of the marker file a writer creates once `<name>` is complete.
pub const SIDECAR_SUFFIX: &str = ".ok";

/// Name suffixes left behind by in-progress writers and editors.
pub const TEMP_SUFFIXES: &[&str] = &[
    ".tmp",
    ".part",
    ".swp",
    ".crdownload",
    ".partial",
    ".download",
    "~",
];

/// Whether a discovered path should be tracked at all.
///
/// Hidden names, temp-suffixed names and sidecar markers are rejected.
#[must_use]
pub fn is_candidate(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
        return false;
    };
    if name.is_empty() || name.starts_with('.') {
        return false;
    }
    if name.ends_with(SIDECAR_SUFFIX) {
        return false;
    }
    !TEMP_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Whether the path is a `<name>.ok` completion marker.
#[must_use]
pub fn is_sidecar_marker(path: &Path) -> bool {
    sidecar_target(path).is_some()
}

/// Path whose completion the marker signals (`x.csv.ok` -> `x.csv`).
#[must_use]
pub fn sidecar_target(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let target = name.strip_suffix(SIDECAR_SUFFIX)?;
    if target.is_empty() {
        return None;
    }
    Some(path.with_file_name(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_names_are_candidates() {
        for name in ["x.csv", "report.final.json", "data", "in/nested/y.parquet"] {
            assert!(is_candidate(Path::new(name)), "{name} should be a candidate");
        }
    }

    #[test]
    fn hidden_and_temp_names_are_rejected() {
        for name in [
            ".hidden",
            "in/.x.csv",
            "x.csv.tmp",
            "x.csv.part",
            ".x.csv.swp",
            "movie.mkv.crdownload",
            "x.partial",
            "x.download",
            "notes.txt~",
        ] {
            assert!(!is_candidate(Path::new(name)), "{name} should be rejected");
        }
    }

    #[test]
    fn markers_are_never_candidates() {
        assert!(!is_candidate(Path::new("in/x.csv.ok")));
        assert!(is_sidecar_marker(Path::new("in/x.csv.ok")));
        assert!(!is_sidecar_marker(Path::new("in/x.csv")));
    }

    #[test]
    fn sidecar_target_strips_marker_suffix() {
        assert_eq!(
            sidecar_target(Path::new("in/x.csv.ok")),
            Some(PathBuf::from("in/x.csv"))
        );
        assert_eq!(sidecar_target(Path::new("in/.ok")), None);
        assert_eq!(sidecar_target(Path::new("in/x.csv")), None);
    }

    #[test]
    fn root_path_is_not_a_candidate() {
        assert!(!is_candidate(Path::new("/")));
    }
}
