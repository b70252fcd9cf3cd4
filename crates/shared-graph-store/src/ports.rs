//! Driven port for the flow-graph database.
//!
//! Production: a graph database adapter living outside this workspace.
//! Testing: [`InMemoryGraphStore`](crate::InMemoryGraphStore).

use async_trait::async_trait;
use shared_types::{
    AddressActivity, Address, ChangeLink, ClusterId, CoSpendEdge, SpendEdge, StoreResult,
    TransactionRecord, TxId, UtxoId, UtxoNode,
};
use std::collections::BTreeSet;

/// Abstract interface for the flow-graph store.
///
/// Reads return empty collections or `None` for unknown keys; only
/// infrastructure failures surface as errors.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Apply `mutations` atomically.
    ///
    /// ## Atomicity Guarantee
    ///
    /// The batch is validated before any mutation is applied. Either ALL
    /// mutations take effect, or NONE do.
    async fn write_batch(&self, mutations: Vec<GraphMutation>) -> StoreResult<()>;

    /// Multi-key snapshot read: one consistent view of every requested node,
    /// in request order.
    async fn get_utxos(&self, ids: &[UtxoId]) -> StoreResult<Vec<Option<UtxoNode>>>;

    /// Single-node read.
    async fn get_utxo(&self, id: &UtxoId) -> StoreResult<Option<UtxoNode>> {
        let mut nodes = self.get_utxos(std::slice::from_ref(id)).await?;
        Ok(nodes.pop().flatten())
    }

    /// Spend edges leaving `id`, ordered by destination.
    async fn outgoing_spends(&self, id: &UtxoId) -> StoreResult<Vec<SpendEdge>>;

    /// Spend edges entering `id`, ordered by source.
    async fn incoming_spends(&self, id: &UtxoId) -> StoreResult<Vec<SpendEdge>>;

    /// Outputs owned by `address`, optionally filtered on the spent flag.
    async fn address_utxos(
        &self,
        address: &Address,
        spent: Option<bool>,
    ) -> StoreResult<Vec<UtxoNode>>;

    /// Co-spend rows where `address` is the near end.
    async fn co_spend_neighbors(&self, address: &Address) -> StoreResult<Vec<CoSpendEdge>>;

    /// Change links with `address` at either end.
    async fn change_links(&self, address: &Address) -> StoreResult<Vec<ChangeLink>>;

    /// Activity rows of `address`, ordered by timestamp.
    async fn address_activity(&self, address: &Address) -> StoreResult<Vec<AddressActivity>>;

    /// Every other address that appeared in a transaction with `address`.
    async fn address_counterparties(&self, address: &Address) -> StoreResult<BTreeSet<Address>>;

    /// Recorded transactions that `address` funded, ordered by timestamp.
    async fn spending_transactions(&self, address: &Address)
        -> StoreResult<Vec<TransactionRecord>>;

    /// A recorded transaction.
    async fn get_transaction(&self, tx_id: &TxId) -> StoreResult<Option<TransactionRecord>>;

    /// The persisted cluster `address` belongs to, if any.
    async fn cluster_of(&self, address: &Address) -> StoreResult<Option<ClusterId>>;

    /// Members of a persisted cluster (empty when unknown).
    async fn cluster_members(&self, cluster_id: &ClusterId) -> StoreResult<BTreeSet<Address>>;
}

/// One mutation inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphMutation {
    /// Upsert an output node.
    MergeUtxo(UtxoNode),
    /// Flag an output as consumed by `spending_tx`.
    MarkSpent { utxo_id: UtxoId, spending_tx: TxId },
    /// Overwrite the taint score of an existing node.
    SetTaint { utxo_id: UtxoId, taint_score: f64 },
    /// Upsert a spend edge keyed by `(from, to)`.
    MergeSpendEdge(SpendEdge),
    /// Record that `a` and `b` co-appeared as inputs of `tx_id`.
    MergeCoSpend { a: Address, b: Address, tx_id: TxId },
    /// Record that `change_address` received change funded by `input_address`.
    MergeChangeLink {
        input_address: Address,
        change_address: Address,
        tx_id: TxId,
    },
    /// Persist a processed transaction summary.
    RecordTransaction(TransactionRecord),
    /// Persist one address appearance.
    RecordActivity(AddressActivity),
    /// Union `members` (and every cluster they already belong to).
    MergeCluster { members: BTreeSet<Address> },
}

impl GraphMutation {
    /// Create a `MarkSpent` mutation.
    pub fn mark_spent(utxo_id: UtxoId, spending_tx: TxId) -> Self {
        GraphMutation::MarkSpent {
            utxo_id,
            spending_tx,
        }
    }

    /// Create a `MergeCoSpend` mutation.
    pub fn co_spend(a: Address, b: Address, tx_id: TxId) -> Self {
        GraphMutation::MergeCoSpend { a, b, tx_id }
    }

    /// Create a `MergeChangeLink` mutation.
    pub fn change_link(input_address: Address, change_address: Address, tx_id: TxId) -> Self {
        GraphMutation::MergeChangeLink {
            input_address,
            change_address,
            tx_id,
        }
    }

    /// Create a `MergeCluster` mutation.
    pub fn merge_cluster<I: IntoIterator<Item = Address>>(members: I) -> Self {
        GraphMutation::MergeCluster {
            members: members.into_iter().collect(),
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GraphMutation::MergeUtxo(_) => "merge_utxo",
            GraphMutation::MarkSpent { .. } => "mark_spent",
            GraphMutation::SetTaint { .. } => "set_taint",
            GraphMutation::MergeSpendEdge(_) => "merge_spend_edge",
            GraphMutation::MergeCoSpend { .. } => "merge_co_spend",
            GraphMutation::MergeChangeLink { .. } => "merge_change_link",
            GraphMutation::RecordTransaction(_) => "record_transaction",
            GraphMutation::RecordActivity(_) => "record_activity",
            GraphMutation::MergeCluster { .. } => "merge_cluster",
        }
    }
}
