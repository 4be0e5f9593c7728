//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters/gauges the ingest pipeline reports into.

use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Terminal outcome of handling one ready path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Recorded and relocated.
    Ingested,
    /// Content already recorded; source left in place.
    Duplicate,
    /// Dry-run: logged only.
    DryRun,
    /// Stat or hash failed; path dropped from tracking.
    Failed,
    /// Transaction failed; path kept for the next pass.
    Retry,
}

impl IngestOutcome {
    /// Every outcome, in label order.
    pub const ALL: [Self; 5] = [
        Self::Ingested,
        Self::Duplicate,
        Self::DryRun,
        Self::Failed,
        Self::Retry,
    ];

    /// Metric label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ingested => "ingested",
            Self::Duplicate => "duplicate",
            Self::DryRun => "dry_run",
            Self::Failed => "failed",
            Self::Retry => "retry",
        }
    }
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    files_total: IntCounterVec,
    bytes_total: IntCounter,
    tracked_paths: IntGauge,
    tick_duration_ms: IntGauge,
}

/// Snapshot of selected gauges and counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Files recorded and relocated.
    pub ingested: u64,
    /// Files skipped as duplicates.
    pub duplicates: u64,
    /// Files only logged because of dry-run mode.
    pub dry_run: u64,
    /// Files dropped after stat/hash failures.
    pub failed: u64,
    /// Transaction failures left for a later pass.
    pub retries: u64,
    /// Bytes relocated into the destination.
    pub bytes_ingested: u64,
    /// Paths currently tracked by the detector.
    pub tracked_paths: i64,
    /// Duration of the latest processor pass (ms).
    pub tick_duration_ms: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let files_total = IntCounterVec::new(
            Opts::new("ingest_files_total", "Ready paths handled by outcome"),
            &["outcome"],
        )
        .map_err(TelemetryError::metric("ingest_files_total", "built"))?;
        let bytes_total = IntCounter::with_opts(Opts::new(
            "ingest_bytes_total",
            "Bytes relocated into the destination store",
        ))
        .map_err(TelemetryError::metric("ingest_bytes_total", "built"))?;
        let tracked_paths = IntGauge::with_opts(Opts::new(
            "tracked_paths",
            "Paths currently tracked by the completion detector",
        ))
        .map_err(TelemetryError::metric("tracked_paths", "built"))?;
        let tick_duration_ms = IntGauge::with_opts(Opts::new(
            "tick_duration_ms",
            "Duration of the latest processor pass (ms)",
        ))
        .map_err(TelemetryError::metric("tick_duration_ms", "built"))?;

        register(&registry, "ingest_files_total", files_total.clone())?;
        register(&registry, "ingest_bytes_total", bytes_total.clone())?;
        register(&registry, "tracked_paths", tracked_paths.clone())?;
        register(&registry, "tick_duration_ms", tick_duration_ms.clone())?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                files_total,
                bytes_total,
                tracked_paths,
                tick_duration_ms,
            }),
        })
    }

    /// Count one handled path.
    pub fn inc_outcome(&self, outcome: IngestOutcome) {
        self.inner
            .files_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Add relocated bytes.
    pub fn add_ingested_bytes(&self, bytes: u64) {
        self.inner.bytes_total.inc_by(bytes);
    }

    /// Set the tracked path gauge.
    pub fn set_tracked_paths(&self, count: usize) {
        self.inner
            .tracked_paths
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Record how long the latest processor pass took.
    pub fn observe_tick(&self, duration: Duration) {
        self.inner
            .tick_duration_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderUtf8 { source })
    }

    /// Take a point-in-time snapshot of the counters and gauges.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let outcome = |outcome: IngestOutcome| {
            self.inner
                .files_total
                .with_label_values(&[outcome.as_str()])
                .get()
        };
        MetricsSnapshot {
            ingested: outcome(IngestOutcome::Ingested),
            duplicates: outcome(IngestOutcome::Duplicate),
            dry_run: outcome(IngestOutcome::DryRun),
            failed: outcome(IngestOutcome::Failed),
            retries: outcome(IngestOutcome::Retry),
            bytes_ingested: self.inner.bytes_total.get(),
            tracked_paths: self.inner.tracked_paths.get(),
            tick_duration_ms: self.inner.tick_duration_ms.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(TelemetryError::metric(name, "registered"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_outcome(IngestOutcome::Ingested);
        metrics.inc_outcome(IngestOutcome::Ingested);
        metrics.inc_outcome(IngestOutcome::Duplicate);
        metrics.inc_outcome(IngestOutcome::Retry);
        metrics.add_ingested_bytes(8);
        metrics.set_tracked_paths(3);
        metrics.observe_tick(Duration::from_millis(45));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.ingested, 2);
        assert_eq!(snapshot.duplicates, 1);
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.failed, 0);
        assert_eq!(snapshot.bytes_ingested, 8);
        assert_eq!(snapshot.tracked_paths, 3);
        assert_eq!(snapshot.tick_duration_ms, 45);

        let rendered = metrics.render()?;
        assert!(rendered.contains("ingest_files_total"));
        assert!(rendered.contains("ingest_bytes_total"));
        Ok(())
    }

    #[test]
    fn outcome_labels_are_unique() {
        let mut labels: Vec<_> = IngestOutcome::ALL.iter().map(|o| o.as_str()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), IngestOutcome::ALL.len());
    }
}
