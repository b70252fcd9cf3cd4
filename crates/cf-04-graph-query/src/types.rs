//! Configuration for the query engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard cap on nodes collected by one traversal.
pub const DEFAULT_MAX_TRAVERSAL_NODES: usize = 10_000;

/// Wall-clock budget for one whole traversal, across all of its store
/// calls. Each store call separately carries the store's own per-call
/// timeout (30 s by default).
pub const DEFAULT_TRAVERSAL_TIMEOUT_SECS: u64 = 120;

/// Query engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub max_traversal_nodes: usize,
    pub traversal_timeout_secs: u64,
}

impl QueryConfig {
    pub fn traversal_timeout(&self) -> Duration {
        Duration::from_secs(self.traversal_timeout_secs)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_traversal_nodes: DEFAULT_MAX_TRAVERSAL_NODES,
            traversal_timeout_secs: DEFAULT_TRAVERSAL_TIMEOUT_SECS,
        }
    }
}
