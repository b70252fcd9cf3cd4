//! Driving port (API - Inbound).

use crate::domain::{ClusterMembership, FlowPath, FlowTrace, SpendingChain};
use crate::error::QueryResult;
use async_trait::async_trait;
use shared_types::{Address, UtxoId, UtxoNode};

/// Primary graph query API.
///
/// Unknown outputs and addresses yield empty results or `None`.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Follow the value of `utxo_id` forward to the outputs it sits in now.
    async fn get_utxo_history(&self, utxo_id: &UtxoId) -> QueryResult<Option<SpendingChain>>;

    /// Outputs owned by `address`, optionally filtered on the spent flag.
    async fn get_address_utxos(
        &self,
        address: &Address,
        spent: Option<bool>,
    ) -> QueryResult<Vec<UtxoNode>>;

    /// Forward trace from one output, up to `max_hops` spends away.
    async fn trace_utxo_flow(&self, start: &UtxoId, max_hops: usize) -> QueryResult<FlowTrace>;

    /// Backward trace to the outputs that funded `start`.
    async fn trace_utxo_sources(&self, start: &UtxoId, max_hops: usize)
        -> QueryResult<FlowTrace>;

    /// Forward trace rooted at every output `address` ever received.
    async fn trace_address_flow(&self, address: &Address, max_hops: usize)
        -> QueryResult<FlowTrace>;

    /// Shortest forward route from `from` to `to`, if one exists within
    /// `max_hops`.
    async fn find_flow_path(
        &self,
        from: &UtxoId,
        to: &UtxoId,
        max_hops: usize,
    ) -> QueryResult<Option<FlowPath>>;

    /// Co-spend neighbors seen with `address` in at least `min_tx_count`
    /// transactions, strongest first. Never includes `address` itself.
    async fn find_clustered_addresses(
        &self,
        address: &Address,
        min_tx_count: u64,
    ) -> QueryResult<Vec<Address>>;

    /// The persisted cluster containing `address`.
    async fn get_cluster_members(&self, address: &Address)
        -> QueryResult<Option<ClusterMembership>>;
}
