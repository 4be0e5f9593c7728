//! Errors raised while installing logging or building and rendering metrics.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed or could not be set.
    #[error("tracing subscriber could not be installed")]
    SubscriberInstall {
        /// Underlying subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// The requested log format is not one of `json`, `pretty` or `auto`.
    #[error("unknown log format")]
    UnknownLogFormat {
        /// Format name supplied by the operator.
        value: String,
    },
    /// A collector was rejected while building or registering it.
    #[error("ingest metric could not be {stage}")]
    Metric {
        /// Metric name.
        name: &'static str,
        /// `built` or `registered`.
        stage: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Gathered metrics could not be encoded as Prometheus text.
    #[error("metrics could not be rendered")]
    Render {
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Encoded metrics were not UTF-8.
    #[error("rendered metrics were not utf-8")]
    RenderUtf8 {
        /// Underlying conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    pub(crate) fn metric(
        name: &'static str,
        stage: &'static str,
    ) -> impl FnOnce(PrometheusError) -> Self {
        move |source| Self::Metric {
            name,
            stage,
            source,
        }
    }
}
