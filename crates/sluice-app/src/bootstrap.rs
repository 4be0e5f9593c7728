//! Application wiring.
//!
//! # Design
//! - Validate configuration and prepare directories before touching the store.
//! - Start the watcher before reconciling so files dropped during the scan are not lost.
//! - Drive ticks and optional rescans from one `select!` loop until shutdown resolves.

use std::fs;
use std::future::{self, Future};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sluice_config::IngestConfig;
use sluice_data::{DedupStore, SqliteDedupStore};
use sluice_fsops::ManifestWriter;
use sluice_telemetry::{GlobalContextGuard, LoggingConfig, Metrics, init_logging, record_mode};
use sluice_watch::{CompletionDetector, ReconcileSummary, Reconciler};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::processor::{Processor, ProcessorSettings};

/// Entry point: install logging, then run until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if logging cannot be installed or [`run_until`] fails.
pub async fn run_app(config: IngestConfig, logging: &LoggingConfig<'_>) -> AppResult<()> {
    init_logging(logging).map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("bootstrap");
    run_until(config, shutdown_signal()).await
}

/// Run the ingestor until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, a directory cannot be
/// created, the store cannot be opened, or the watcher cannot start.
pub async fn run_until<F>(config: IngestConfig, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()>,
{
    config
        .validate()
        .map_err(|err| AppError::config("config.validate", err))?;
    if config.concurrency == 0 {
        warn!(workers = config.worker_limit(), "concurrency 0 clamped");
    }
    record_mode(if config.dry_run { "dry_run" } else { "ingest" });
    prepare_directories(&config)?;

    let store = SqliteDedupStore::open(&config.store_path)
        .await
        .map_err(|err| AppError::data("store.open", err))?;
    let store = Arc::new(store);
    let metrics = Metrics::new().map_err(|err| AppError::telemetry("metrics.init", err))?;

    let detector = Arc::new(CompletionDetector::new(
        config.input_root.clone(),
        config.policy,
        config.recursive,
    ));
    detector
        .start()
        .map_err(|err| AppError::watch("detector.start", err))?;
    reconcile(&detector).await?;

    let processor = Processor::new(
        Arc::clone(&detector),
        Arc::clone(&store) as Arc<dyn DedupStore>,
        Arc::new(ManifestWriter::new(config.manifest_root.clone())),
        metrics.clone(),
        ProcessorSettings {
            input_root: config.input_root.clone(),
            destination_root: config.destination_root.clone(),
            layout: config.layout,
            concurrency: config.worker_limit(),
            dry_run: config.dry_run,
        },
    );

    info!(
        input = %config.input_root.display(),
        destination = %config.destination_root.display(),
        method = config.policy.method(),
        layout = config.layout.as_str(),
        concurrency = config.worker_limit(),
        dry_run = config.dry_run,
        "ingestor running"
    );

    let mut ticks = interval(config.tick_interval);
    let mut rescans = config.reconcile_interval.map(interval);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            _ = ticks.tick() => {
                processor.run_once().await;
            }
            () = next_rescan(rescans.as_mut()) => {
                if let Err(err) = reconcile(&detector).await {
                    warn!(error = ?err, "periodic reconcile failed");
                }
            }
        }
    }

    detector.stop();
    store.close().await;
    match metrics.render() {
        Ok(rendered) => debug!(metrics = %rendered, "final metrics"),
        Err(err) => warn!(error = ?err, "metrics render failed"),
    }
    info!("ingestor stopped");
    Ok(())
}

fn prepare_directories(config: &IngestConfig) -> AppResult<()> {
    let store_dir = config.store_path.parent().filter(|dir| !dir.as_os_str().is_empty());
    for dir in [
        Some(config.input_root.as_path()),
        Some(config.destination_root.as_path()),
        Some(config.manifest_root.as_path()),
        store_dir,
    ]
    .into_iter()
    .flatten()
    {
        create_dir(dir)?;
    }
    Ok(())
}

fn create_dir(dir: &Path) -> AppResult<()> {
    fs::create_dir_all(dir).map_err(|source| AppError::io("prepare.create_dir", dir, source))
}

async fn reconcile(detector: &Arc<CompletionDetector>) -> AppResult<ReconcileSummary> {
    let detector = Arc::clone(detector);
    tokio::task::spawn_blocking(move || Reconciler::scan(&detector))
        .await
        .map_err(|err| AppError::join("reconcile", err))?
        .map_err(|err| AppError::watch("reconcile.scan", err))
}

fn interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn next_rescan(rescans: Option<&mut Interval>) {
    match rescans {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "ctrl-c handler unavailable");
            future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_config::{CompletionPolicy, DestinationLayout};
    use sluice_test_support::fixtures::IngestDirs;

    fn config(dirs: &IngestDirs) -> IngestConfig {
        IngestConfig {
            input_root: dirs.input.clone(),
            destination_root: dirs.destination.clone(),
            manifest_root: dirs.manifests.clone(),
            store_path: dirs.store.clone(),
            policy: CompletionPolicy::Sidecar,
            layout: DestinationLayout::Mirror,
            concurrency: 1,
            dry_run: false,
            recursive: false,
            tick_interval: Duration::from_millis(50),
            reconcile_interval: None,
        }
    }

    #[tokio::test]
    async fn invalid_config_fails_before_creating_directories() -> anyhow::Result<()> {
        let dirs = IngestDirs::new()?;
        let mut config = config(&dirs);
        config.tick_interval = Duration::ZERO;
        let result = run_until(config, future::ready(())).await;
        assert!(matches!(result, Err(AppError::Config { .. })));
        assert!(!dirs.destination.exists());
        Ok(())
    }

    #[tokio::test]
    async fn immediate_shutdown_prepares_directories_and_store() -> anyhow::Result<()> {
        let dirs = IngestDirs::new()?;
        run_until(config(&dirs), future::ready(())).await?;
        assert!(dirs.destination.is_dir());
        assert!(dirs.manifests.is_dir());
        assert!(dirs.store.is_file());
        Ok(())
    }

    #[tokio::test]
    async fn zero_concurrency_starts_with_one_worker() -> anyhow::Result<()> {
        let dirs = IngestDirs::new()?;
        let mut config = config(&dirs);
        config.concurrency = 0;
        run_until(config, future::ready(())).await?;
        assert!(dirs.store.is_file());
        Ok(())
    }
}
