//! Error types for configuration operations.

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Completion method name was not recognised.
    #[error("unknown completion method")]
    UnknownMethod {
        /// Method name provided by the caller.
        value: String,
    },
    /// Destination layout name was not recognised.
    #[error("unknown destination layout")]
    UnknownLayout {
        /// Layout name provided by the caller.
        value: String,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_are_constant() {
        let invalid = ConfigError::InvalidField {
            field: "concurrency",
            reason: "zero",
            value: Some("0".to_string()),
        };
        assert_eq!(invalid.to_string(), "invalid configuration field");

        let method = ConfigError::UnknownMethod {
            value: "polling".to_string(),
        };
        assert_eq!(method.to_string(), "unknown completion method");

        let layout = ConfigError::UnknownLayout {
            value: "flat".to_string(),
        };
        assert_eq!(layout.to_string(), "unknown destination layout");
    }
}
