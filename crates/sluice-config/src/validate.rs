//! Validation helpers for configuration documents.

use std::path::Path;
use std::time::Duration;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};

pub(crate) fn require_path(field: &'static str, path: &Path) -> ConfigResult<()> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::InvalidField {
            field,
            reason: "empty",
            value: None,
        });
    }
    Ok(())
}

/// Relocated files must not land where the watcher would pick them up again.
pub(crate) fn require_outside_input(
    field: &'static str,
    input_root: &Path,
    candidate: &Path,
    recursive: bool,
) -> ConfigResult<()> {
    if candidate == input_root {
        return Err(ConfigError::InvalidField {
            field,
            reason: "same_as_input",
            value: Some(candidate.display().to_string()),
        });
    }
    if recursive && candidate.starts_with(input_root) {
        return Err(ConfigError::InvalidField {
            field,
            reason: "inside_recursive_input",
            value: Some(candidate.display().to_string()),
        });
    }
    Ok(())
}

/// Zero is accepted and clamped to one worker by the caller.
pub(crate) fn concurrency(value: usize) -> ConfigResult<()> {
    if value > defaults::MAX_CONCURRENCY {
        return Err(ConfigError::InvalidField {
            field: "concurrency",
            reason: "too_large",
            value: Some(value.to_string()),
        });
    }
    Ok(())
}

pub(crate) fn non_zero_duration(field: &'static str, value: Duration) -> ConfigResult<()> {
    if value.is_zero() {
        return Err(ConfigError::InvalidField {
            field,
            reason: "zero",
            value: Some(format!("{}ms", value.as_millis())),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn require_path_rejects_empty() {
        assert!(require_path("input_root", Path::new("")).is_err());
        assert!(require_path("input_root", Path::new("files")).is_ok());
    }

    #[test]
    fn nested_destination_only_rejected_when_recursive() {
        let input = PathBuf::from("/data/in");
        let nested = input.join("done");
        assert!(require_outside_input("destination_root", &input, &nested, false).is_ok());
        let err = require_outside_input("destination_root", &input, &nested, true).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                reason: "inside_recursive_input",
                ..
            }
        ));
    }

    #[test]
    fn concurrency_bounds_are_enforced() {
        assert!(concurrency(0).is_ok());
        assert!(concurrency(1).is_ok());
        assert!(concurrency(defaults::MAX_CONCURRENCY).is_ok());
        assert!(concurrency(defaults::MAX_CONCURRENCY + 1).is_err());
    }

    #[test]
    fn non_zero_duration_reports_milliseconds() {
        let err = non_zero_duration("tick_interval", Duration::ZERO).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidField {
                field: "tick_interval",
                reason: "zero",
                value: Some("0ms".to_string()),
            }
        );
    }
}
