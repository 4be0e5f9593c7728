//! Command-line flags. Every flag can also be supplied through a `SLUICE_*` variable.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use sluice_config::{CompletionPolicy, DestinationLayout, IngestConfig, defaults};
use sluice_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_version};

use crate::error::{AppError, AppResult};

/// Watch a drop directory and ingest completed files exactly once.
#[derive(Debug, Clone, Parser)]
#[command(name = "sluice", version, about)]
pub struct Cli {
    /// Directory watched for dropped files.
    #[arg(long, env = "SLUICE_INPUT", default_value = defaults::INPUT_ROOT)]
    pub input: PathBuf,
    /// Directory receiving relocated files.
    #[arg(long = "dest", env = "SLUICE_DEST", default_value = defaults::DESTINATION_ROOT)]
    pub destination: PathBuf,
    /// Root of the partitioned manifest log.
    #[arg(long, env = "SLUICE_MANIFESTS", default_value = defaults::MANIFEST_ROOT)]
    pub manifests: PathBuf,
    /// `SQLite` file backing the dedup store.
    #[arg(long = "db", env = "SLUICE_DB", default_value = defaults::STORE_PATH)]
    pub store: PathBuf,
    /// Completion method: `stability_window` or `sidecar`.
    #[arg(long, env = "SLUICE_METHOD", default_value = defaults::METHOD)]
    pub method: String,
    /// Quiet period for the stability window, in seconds.
    #[arg(long, env = "SLUICE_STABILITY_SECONDS", default_value_t = defaults::STABILITY_SECONDS)]
    pub stability_seconds: u64,
    /// Destination layout: `mirror` or `ingest-date`.
    #[arg(long, env = "SLUICE_LAYOUT", default_value = "mirror")]
    pub layout: String,
    /// Parallel workers per tick.
    #[arg(long, env = "SLUICE_CONCURRENCY", default_value_t = defaults::CONCURRENCY)]
    pub concurrency: usize,
    /// Log what would be ingested without recording or moving anything.
    #[arg(long, env = "SLUICE_DRY_RUN")]
    pub dry_run: bool,
    /// Watch subdirectories of the input as well.
    #[arg(long, env = "SLUICE_RECURSIVE")]
    pub recursive: bool,
    /// Interval between processor passes, in milliseconds.
    #[arg(long, env = "SLUICE_TICK_MS", default_value_t = defaults::TICK_INTERVAL_MS)]
    pub tick_ms: u64,
    /// Interval between full input rescans, in seconds; 0 rescans only at startup.
    #[arg(long, env = "SLUICE_RECONCILE_SECONDS", default_value_t = 0)]
    pub reconcile_seconds: u64,
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "SLUICE_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
    /// Log format: `json`, `pretty` or `auto`.
    #[arg(long, env = "SLUICE_LOG_FORMAT", default_value = "auto")]
    pub log_format: String,
}

impl Cli {
    /// Map the flags onto the typed configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown method or layout name.
    pub fn ingest_config(&self) -> AppResult<IngestConfig> {
        let policy = CompletionPolicy::parse(&self.method, self.stability_seconds)
            .map_err(|err| AppError::config("cli.method", err))?;
        let layout = self
            .layout
            .parse::<DestinationLayout>()
            .map_err(|err| AppError::config("cli.layout", err))?;
        Ok(IngestConfig {
            input_root: self.input.clone(),
            destination_root: self.destination.clone(),
            manifest_root: self.manifests.clone(),
            store_path: self.store.clone(),
            policy,
            layout,
            concurrency: self.concurrency,
            dry_run: self.dry_run,
            recursive: self.recursive,
            tick_interval: Duration::from_millis(self.tick_ms),
            reconcile_interval: (self.reconcile_seconds > 0)
                .then(|| Duration::from_secs(self.reconcile_seconds)),
        })
    }

    /// Logging settings for the subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown log format.
    pub fn logging_config(&self) -> AppResult<LoggingConfig<'_>> {
        let format = self
            .log_format
            .parse::<LogFormat>()
            .map_err(|err| AppError::telemetry("cli.log_format", err))?;
        Ok(LoggingConfig {
            level: &self.log_level,
            format,
            build_version: build_version(),
        })
    }
}
