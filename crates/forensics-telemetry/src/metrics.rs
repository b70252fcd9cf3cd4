//! Prometheus metrics for the forensic core.
//!
//! All metrics follow the naming convention `cf_<component>_<metric>_<unit>`.
//! Engines stay free of metrics; the runtime records them from the outcomes
//! and reports the engines return.

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Process-wide metrics registry.
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // INGESTION
    // =========================================================================

    /// Ingestion events by outcome: `ingested`, `rejected` (malformed) or
    /// `failed` (store or invariant error).
    pub static ref TRANSACTIONS_PROCESSED: CounterVec = CounterVec::new(
        Opts::new("cf_ingest_transactions_total", "Transactions handled by the ingestion pipeline"),
        &["outcome"]
    ).expect("metric creation failed");

    pub static ref INGEST_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "cf_ingest_transaction_duration_seconds",
            "Time to normalize, propagate and persist one transaction"
        ).buckets(exponential_buckets(0.0001, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // TAINT
    // =========================================================================

    /// Inputs whose consumed output was not in the graph.
    pub static ref MISSING_INPUTS: Counter = Counter::new(
        "cf_taint_missing_inputs_total",
        "Inputs treated as untainted because their output was unknown"
    ).expect("metric creation failed");

    pub static ref INVARIANT_VIOLATIONS: CounterVec = CounterVec::new(
        Opts::new("cf_invariant_violations_total", "Rejected writes and impossible transactions"),
        &["component"]
    ).expect("metric creation failed");

    // =========================================================================
    // CLUSTERING
    // =========================================================================

    pub static ref CLUSTER_MERGES: Counter = Counter::new(
        "cf_clustering_merges_total",
        "Union operations that joined two separate address sets"
    ).expect("metric creation failed");

    pub static ref HEURISTIC_FAILURES: CounterVec = CounterVec::new(
        Opts::new("cf_clustering_heuristic_failures_total", "Heuristics skipped after a store error"),
        &["heuristic"]
    ).expect("metric creation failed");

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub static ref TRAVERSAL_NODES: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "cf_query_traversal_nodes",
            "Outputs collected per traversal"
        ).buckets(exponential_buckets(1.0, 4.0, 8).expect("valid buckets"))
    ).expect("metric creation failed");

    pub static ref TRAVERSALS_TRUNCATED: Counter = Counter::new(
        "cf_query_traversals_truncated_total",
        "Traversals stopped by the node cap"
    ).expect("metric creation failed");
}

/// Proof that the collectors are registered.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    _registered: (),
}

/// Register all collectors with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Ingestion
        Box::new(TRANSACTIONS_PROCESSED.clone()),
        Box::new(INGEST_DURATION.clone()),
        // Taint
        Box::new(MISSING_INPUTS.clone()),
        Box::new(INVARIANT_VIOLATIONS.clone()),
        // Clustering
        Box::new(CLUSTER_MERGES.clone()),
        Box::new(HEURISTIC_FAILURES.clone()),
        // Queries
        Box::new(TRAVERSAL_NODES.clone()),
        Box::new(TRAVERSALS_TRUNCATED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _registered: () })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard that observes a histogram on drop.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}
