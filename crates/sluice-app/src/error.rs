//! # Design
//!
//! - Centralize application-level errors for bootstrap and processing.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration was rejected.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: sluice_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: sluice_telemetry::TelemetryError,
    },
    /// Dedup store operations failed.
    #[error("dedup store operation failed")]
    Data {
        /// Operation identifier.
        operation: &'static str,
        /// Source data error.
        source: sluice_data::DataError,
    },
    /// Watching or scanning the input failed.
    #[error("input watch operation failed")]
    Watch {
        /// Operation identifier.
        operation: &'static str,
        /// Source watch error.
        source: sluice_watch::WatchError,
    },
    /// Filesystem primitives failed.
    #[error("filesystem operation failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        source: sluice_fsops::FsOpsError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        source: io::Error,
    },
    /// A blocking task panicked or was cancelled.
    #[error("background task failed")]
    Join {
        /// Operation identifier.
        operation: &'static str,
        /// Source join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: sluice_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: sluice_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn data(operation: &'static str, source: sluice_data::DataError) -> Self {
        Self::Data { operation, source }
    }

    pub(crate) const fn watch(operation: &'static str, source: sluice_watch::WatchError) -> Self {
        Self::Watch { operation, source }
    }

    pub(crate) const fn fsops(operation: &'static str, source: sluice_fsops::FsOpsError) -> Self {
        Self::FsOps { operation, source }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: Some(path.into()),
            source,
        }
    }

    pub(crate) const fn join(operation: &'static str, source: tokio::task::JoinError) -> Self {
        Self::Join { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn app_error_helpers_build_variants() {
        let config = AppError::config(
            "config.validate",
            sluice_config::ConfigError::UnknownMethod {
                value: "bad".to_string(),
            },
        );
        assert!(matches!(config, AppError::Config { .. }));
        assert_eq!(config.to_string(), "configuration operation failed");
        assert!(config.source().is_some());

        let telemetry = AppError::telemetry(
            "telemetry.init",
            sluice_telemetry::TelemetryError::UnknownLogFormat {
                value: "xml".to_string(),
            },
        );
        assert!(matches!(telemetry, AppError::Telemetry { .. }));

        let data = AppError::data(
            "store.exists",
            sluice_data::DataError::DuplicateDigest {
                digest: "abc".to_string(),
            },
        );
        assert!(matches!(data, AppError::Data { .. }));

        let watch = AppError::watch("detector.start", sluice_watch::WatchError::AlreadyStarted);
        assert!(matches!(watch, AppError::Watch { .. }));

        let fsops = AppError::fsops(
            "inspect.hash",
            sluice_fsops::FsOpsError::NotRegularFile {
                path: PathBuf::from("in/dir"),
            },
        );
        assert!(matches!(fsops, AppError::FsOps { .. }));

        let io = AppError::io("prepare.create_dir", "warehouse", io::Error::other("denied"));
        assert!(matches!(io, AppError::Io { path: Some(_), .. }));
        assert_eq!(io.to_string(), "io operation failed");
    }
}
