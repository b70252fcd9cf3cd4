//! # Runtime Configuration
//!
//! One configuration tree for every engine, the store decorator and the
//! ingestion pipeline. Defaults come from each engine's own config;
//! `CF_*` environment variables override them.

use cf_02_taint_propagation::{FeeTaintPolicy, TaintConfig, TaintModel};
use cf_03_address_clustering::ClusteringConfig;
use cf_04_graph_query::QueryConfig;
use forensics_telemetry::parse_flag;
use serde::{Deserialize, Serialize};
use shared_graph_store::{RetryPolicy, DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_RETRY_ATTEMPTS};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Haircut factor used when `CF_TAINT_MODEL=haircut` names no factor.
pub const DEFAULT_HAIRCUT_FACTOR: f64 = 0.9;

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ForensicsConfig {
    pub taint: TaintConfig,
    pub clustering: ClusteringConfig,
    pub query: QueryConfig,
    pub store: StoreConfig,
    pub ingestion: IngestionConfig,
}

/// Graph store decorator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Per-call timeout.
    pub query_timeout_secs: u64,
    /// Attempts per call, including the first.
    pub retry_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
        }
    }
}

impl StoreConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            ..RetryPolicy::default()
        }
    }
}

/// Ingestion pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Events in flight at once in `ingest_concurrent`.
    pub concurrency: usize,
    /// Run the change detector on every transaction and flag the result.
    pub detect_change: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            detect_change: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ForensicsConfig {
    /// Defaults overridden by `CF_*` environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `CF_TAINT_MODEL` | `taint.model` (`proportional`, `fifo`, `haircut`) |
    /// | `CF_HAIRCUT_FACTOR` | haircut factor |
    /// | `CF_EXCLUDE_CHANGE` | `taint.exclude_change_from_distribution` |
    /// | `CF_FEE_POLICY` | `taint.fee_policy` |
    /// | `CF_MIXER_THRESHOLD` | `clustering.mixer_threshold` |
    /// | `CF_TEMPORAL_WINDOW_SECS` | `clustering.temporal_window_secs` |
    /// | `CF_QUERY_TIMEOUT_SECS` | `store.query_timeout_secs` |
    /// | `CF_RETRY_ATTEMPTS` | `store.retry_attempts` |
    /// | `CF_MAX_TRAVERSAL_NODES` | `query.max_traversal_nodes` |
    /// | `CF_INGEST_CONCURRENCY` | `ingestion.concurrency` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let factor = parse::<f64, _>(&lookup, "CF_HAIRCUT_FACTOR")?;
        if let Some(name) = lookup("CF_TAINT_MODEL") {
            config.taint.model =
                TaintModel::from_name(&name, factor.unwrap_or(DEFAULT_HAIRCUT_FACTOR)).ok_or(
                    ConfigError::InvalidValue {
                        var: "CF_TAINT_MODEL",
                        value: name,
                    },
                )?;
        }
        if let Some(flag) = lookup("CF_EXCLUDE_CHANGE") {
            config.taint.exclude_change_from_distribution = parse_flag(&flag);
        }
        if let Some(name) = lookup("CF_FEE_POLICY") {
            config.taint.fee_policy =
                FeeTaintPolicy::from_name(&name).ok_or(ConfigError::InvalidValue {
                    var: "CF_FEE_POLICY",
                    value: name,
                })?;
        }

        if let Some(v) = parse(&lookup, "CF_MIXER_THRESHOLD")? {
            config.clustering.mixer_threshold = v;
        }
        if let Some(v) = parse(&lookup, "CF_TEMPORAL_WINDOW_SECS")? {
            config.clustering.temporal_window_secs = v;
        }
        if let Some(v) = parse(&lookup, "CF_QUERY_TIMEOUT_SECS")? {
            config.store.query_timeout_secs = v;
        }
        if let Some(v) = parse(&lookup, "CF_RETRY_ATTEMPTS")? {
            config.store.retry_attempts = v;
        }
        if let Some(v) = parse(&lookup, "CF_MAX_TRAVERSAL_NODES")? {
            config.query.max_traversal_nodes = v;
        }
        if let Some(v) = parse(&lookup, "CF_INGEST_CONCURRENCY")? {
            config.ingestion.concurrency = v;
        }

        Ok(config)
    }

    /// Reject settings no engine can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.taint
            .model
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let checks = [
            (self.clustering.mixer_threshold == 0, "mixer_threshold must be positive"),
            (
                self.clustering.temporal_window_secs == 0,
                "temporal_window_secs must be positive",
            ),
            (
                self.clustering.temporal_sync_threshold == 0,
                "temporal_sync_threshold must be positive",
            ),
            (
                self.clustering.max_addresses_per_run == 0,
                "max_addresses_per_run must be positive",
            ),
            (
                self.query.max_traversal_nodes == 0,
                "max_traversal_nodes must be positive",
            ),
            (self.store.query_timeout_secs == 0, "query_timeout_secs must be positive"),
            (self.store.retry_attempts == 0, "retry_attempts must be at least 1"),
            (self.ingestion.concurrency == 0, "ingestion concurrency must be at least 1"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(ConfigError::Invalid((*message).to_string())),
            None => Ok(()),
        }
    }
}

fn parse<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value }),
    }
}
