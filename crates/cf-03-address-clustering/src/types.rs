//! Configuration for the clustering engine.

use serde::{Deserialize, Serialize};

/// Clustering configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Co-spend pairs seen together in more transactions than this are
    /// treated as mixer/exchange noise and never merged.
    pub mixer_threshold: u64,
    /// Change links merge once they have been observed this many times.
    pub change_merge_threshold: u64,
    /// Two activity events correlate when this close in time.
    pub temporal_window_secs: u64,
    /// Correlated events needed before a temporal merge.
    pub temporal_sync_threshold: u64,
    /// Hard cap on addresses expanded by one `cluster_addresses` run.
    pub max_addresses_per_run: usize,
    /// Candidates checked for temporal correlation per address.
    pub max_temporal_candidates: usize,
    /// Hard cap on addresses visited by a peeling-chain walk.
    pub peel_max_hops: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            mixer_threshold: 50,
            change_merge_threshold: 2,
            temporal_window_secs: 300,
            temporal_sync_threshold: 10,
            max_addresses_per_run: 10_000,
            max_temporal_candidates: 500,
            peel_max_hops: 100,
        }
    }
}
