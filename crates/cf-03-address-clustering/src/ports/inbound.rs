//! Driving port (API - Inbound).

use crate::domain::{ClusterStats, ClusteringReport, OwnershipAssessment, PeelingChainReport};
use crate::error::ClusteringResult;
use async_trait::async_trait;
use shared_types::{Address, ClusterId};

/// Primary clustering API.
#[async_trait]
pub trait ClusteringApi: Send + Sync {
    /// Run co-spend, change and temporal heuristics from `seeds`, expanding
    /// up to `depth` hops, and persist the resulting merges.
    async fn cluster_addresses(
        &self,
        seeds: &[Address],
        depth: usize,
    ) -> ClusteringResult<ClusteringReport>;

    /// Score how likely `a` and `b` share an owner.
    async fn find_common_ownership(
        &self,
        a: &Address,
        b: &Address,
    ) -> ClusteringResult<OwnershipAssessment>;

    /// Follow change outputs from `address` looking for a peeling pattern.
    async fn detect_peeling_chain(&self, address: &Address) -> ClusteringResult<PeelingChainReport>;

    /// Size and unspent balance of a persisted cluster; `None` if unknown.
    async fn calculate_cluster_stats(
        &self,
        cluster_id: &ClusterId,
    ) -> ClusteringResult<Option<ClusterStats>>;
}
