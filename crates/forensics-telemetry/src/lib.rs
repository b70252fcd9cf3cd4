//! # Forensics Telemetry
//!
//! Structured logging and Prometheus metrics for the forensic core.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use forensics_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     // engines log through `tracing`; the runtime records metrics
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CF_SERVICE_NAME` | `chain-forensics` | Service name in log lines |
//! | `CF_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `CF_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |
//! | `CF_METRICS_ENABLED` | `true` | Register Prometheus collectors |

mod config;
mod logging;
pub mod metrics;

pub use config::{parse_flag, TelemetryConfig, DEFAULT_SERVICE_NAME};
pub use logging::env_filter;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, MetricsHandle, CLUSTER_MERGES,
    HEURISTIC_FAILURES, INGEST_DURATION, INVARIANT_VIOLATIONS, MISSING_INPUTS,
    TRANSACTIONS_PROCESSED, TRAVERSALS_TRUNCATED, TRAVERSAL_NODES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging and register metrics.
///
/// Returns a guard to hold for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };
    logging::init_logging(&config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name,
        metrics,
    })
}

/// Keeps telemetry active; logs shutdown when dropped.
pub struct TelemetryGuard {
    service_name: String,
    metrics: Option<MetricsHandle>,
}

impl TelemetryGuard {
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Record a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_inc_macro() {
        let before = MISSING_INPUTS.get();
        metric_inc!(MISSING_INPUTS);
        metric_inc!(HEURISTIC_FAILURES, &["co_spend"]);
        assert_eq!(MISSING_INPUTS.get(), before + 1.0);
        assert!(HEURISTIC_FAILURES.with_label_values(&["co_spend"]).get() >= 1.0);
    }
}
