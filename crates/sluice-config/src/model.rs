//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers consumed by the detector, processor and bootstrap.
//! - Policy selection is a tagged variant so callers never switch on strings.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::validate;

/// Rule deciding when a dropped file is fully written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Ready once size and mtime have been unchanged for `window`.
    StabilityWindow {
        /// Quiet period required after the last observed change.
        window: Duration,
    },
    /// Ready once a `<name>.ok` marker has been created next to the file.
    #[default]
    Sidecar,
}

impl CompletionPolicy {
    /// Build a policy from its method name and the stability window in seconds.
    ///
    /// The window is ignored for the sidecar method.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownMethod`] for unrecognised method names.
    pub fn parse(method: &str, stability_seconds: u64) -> ConfigResult<Self> {
        match method.trim() {
            defaults::METHOD_STABILITY_WINDOW => Ok(Self::StabilityWindow {
                window: Duration::from_secs(stability_seconds),
            }),
            defaults::METHOD_SIDECAR => Ok(Self::Sidecar),
            other => Err(ConfigError::UnknownMethod {
                value: other.to_string(),
            }),
        }
    }

    /// Render the method name used on the command line.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::StabilityWindow { .. } => defaults::METHOD_STABILITY_WINDOW,
            Self::Sidecar => defaults::METHOD_SIDECAR,
        }
    }
}

/// Partitioning scheme applied under the destination root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestinationLayout {
    /// Mirror the path relative to the input root.
    #[default]
    Mirror,
    /// Group files under `ingest_date=YYYY-MM-DD/`, keeping their relative path.
    IngestDate,
}

impl FromStr for DestinationLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mirror" => Ok(Self::Mirror),
            "ingest-date" | "ingest_date" => Ok(Self::IngestDate),
            other => Err(ConfigError::UnknownLayout {
                value: other.to_string(),
            }),
        }
    }
}

impl DestinationLayout {
    /// Render the layout as its kebab-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mirror => "mirror",
            Self::IngestDate => "ingest-date",
        }
    }
}

/// Complete configuration consumed by the ingestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Directory watched for dropped files.
    pub input_root: PathBuf,
    /// Directory receiving relocated files.
    pub destination_root: PathBuf,
    /// Directory receiving the manifest log partitions.
    pub manifest_root: PathBuf,
    /// `SQLite` file backing the dedup store.
    pub store_path: PathBuf,
    /// Completion policy applied to candidate paths.
    pub policy: CompletionPolicy,
    /// Destination partitioning scheme.
    pub layout: DestinationLayout,
    /// Worker pool width for each processor pass.
    pub concurrency: usize,
    /// Log intended actions without recording or moving anything.
    pub dry_run: bool,
    /// Watch subdirectories of the input root as well.
    pub recursive: bool,
    /// Interval between processor passes.
    pub tick_interval: Duration,
    /// Interval between full reconciliation scans; `None` scans only at startup.
    pub reconcile_interval: Option<Duration>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from(defaults::INPUT_ROOT),
            destination_root: PathBuf::from(defaults::DESTINATION_ROOT),
            manifest_root: PathBuf::from(defaults::MANIFEST_ROOT),
            store_path: PathBuf::from(defaults::STORE_PATH),
            policy: CompletionPolicy::default(),
            layout: DestinationLayout::default(),
            concurrency: defaults::CONCURRENCY,
            dry_run: false,
            recursive: false,
            tick_interval: Duration::from_millis(defaults::TICK_INTERVAL_MS),
            reconcile_interval: None,
        }
    }
}

impl IngestConfig {
    /// Workers per tick; a configured zero means one.
    #[must_use]
    pub const fn worker_limit(&self) -> usize {
        if self.concurrency == 0 { 1 } else { self.concurrency }
    }

    /// Check the configuration for values the ingestor cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] describing the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        validate::require_path("input_root", &self.input_root)?;
        validate::require_path("destination_root", &self.destination_root)?;
        validate::require_path("manifest_root", &self.manifest_root)?;
        validate::require_path("store_path", &self.store_path)?;
        validate::require_outside_input(
            "destination_root",
            &self.input_root,
            &self.destination_root,
            self.recursive,
        )?;
        validate::require_outside_input(
            "manifest_root",
            &self.input_root,
            &self.manifest_root,
            self.recursive,
        )?;
        if let Some(store_dir) = self.store_path.parent() {
            validate::require_outside_input(
                "store_path",
                &self.input_root,
                store_dir,
                self.recursive,
            )?;
        }
        validate::concurrency(self.concurrency)?;
        validate::non_zero_duration("tick_interval", self.tick_interval)?;
        if let CompletionPolicy::StabilityWindow { window } = self.policy {
            validate::non_zero_duration("stability_seconds", window)?;
        }
        if let Some(interval) = self.reconcile_interval {
            validate::non_zero_duration("reconcile_interval", interval)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_policy_parses_known_methods() -> ConfigResult<()> {
        assert_eq!(
            CompletionPolicy::parse("stability_window", 2)?,
            CompletionPolicy::StabilityWindow {
                window: Duration::from_secs(2)
            }
        );
        assert_eq!(
            CompletionPolicy::parse("sidecar", 2)?,
            CompletionPolicy::Sidecar
        );
        assert_eq!(CompletionPolicy::Sidecar.method(), "sidecar");
        Ok(())
    }

    #[test]
    fn completion_policy_rejects_unknown_method() {
        let err = CompletionPolicy::parse("inotify", 1).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownMethod {
                value: "inotify".to_string()
            }
        );
    }

    #[test]
    fn destination_layout_round_trips_names() -> ConfigResult<()> {
        assert_eq!(
            "ingest-date".parse::<DestinationLayout>()?,
            DestinationLayout::IngestDate
        );
        assert_eq!(
            "ingest_date".parse::<DestinationLayout>()?,
            DestinationLayout::IngestDate
        );
        assert_eq!(DestinationLayout::Mirror.as_str(), "mirror");
        assert!("flat".parse::<DestinationLayout>().is_err());
        Ok(())
    }

    #[test]
    fn default_config_is_valid() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.policy, CompletionPolicy::Sidecar);
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn validate_rejects_zero_window() {
        let config = IngestConfig {
            policy: CompletionPolicy::StabilityWindow {
                window: Duration::ZERO,
            },
            ..IngestConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "stability_seconds",
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_destination_equal_to_input() {
        let config = IngestConfig {
            destination_root: PathBuf::from(defaults::INPUT_ROOT),
            ..IngestConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "destination_root",
                reason: "same_as_input",
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_store_inside_watched_input() {
        let config = IngestConfig {
            store_path: PathBuf::from(defaults::INPUT_ROOT).join("sluice.db"),
            ..IngestConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                field: "store_path",
                reason: "same_as_input",
                ..
            })
        ));
    }
}
