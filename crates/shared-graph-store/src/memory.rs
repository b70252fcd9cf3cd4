//! In-memory graph store.
//!
//! Backs unit and integration tests and single-process runs. Carries fault
//! injection hooks so callers can exercise retry and degradation paths.

use crate::ports::{GraphMutation, GraphStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{
    clamp_taint, Address, AddressActivity, ChangeLink, ClusterId, CoSpendEdge, GraphStoreError,
    SpendEdge, StoreResult, TransactionRecord, TxId, UtxoId, UtxoNode, PROPORTION_EPSILON,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error};

/// Indexed contents of the graph.
#[derive(Default)]
struct GraphState {
    utxos: HashMap<UtxoId, UtxoNode>,
    /// Which transaction consumed each output (kept even if the node is absent).
    spent_by: HashMap<UtxoId, TxId>,
    outgoing: HashMap<UtxoId, BTreeMap<UtxoId, SpendEdge>>,
    incoming: HashMap<UtxoId, BTreeSet<UtxoId>>,
    address_utxos: HashMap<Address, BTreeSet<UtxoId>>,
    co_spend: HashMap<Address, BTreeMap<Address, CoSpendEdge>>,
    change_links: BTreeMap<(Address, Address), ChangeLink>,
    change_index: HashMap<Address, BTreeSet<(Address, Address)>>,
    transactions: HashMap<TxId, TransactionRecord>,
    spending_index: HashMap<Address, BTreeSet<TxId>>,
    participation: HashMap<Address, BTreeSet<TxId>>,
    activity: HashMap<Address, BTreeSet<AddressActivity>>,
    clusters: HashMap<ClusterId, BTreeSet<Address>>,
    membership: HashMap<Address, ClusterId>,
}

/// Faults to inject into upcoming calls.
#[derive(Default)]
struct FaultPlan {
    remaining_failures: u32,
    remaining_write_failures: u32,
    failing_addresses: HashSet<Address>,
    latency: Option<Duration>,
}

/// In-memory [`GraphStore`] adapter.
#[derive(Default)]
pub struct InMemoryGraphStore {
    state: RwLock<GraphState>,
    faults: RwLock<FaultPlan>,
    calls: AtomicU64,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail with `Unavailable`.
    pub fn inject_failures(&self, count: u32) {
        self.faults.write().remaining_failures = count;
    }

    /// Make the next `count` batch writes fail with `Unavailable`.
    pub fn fail_writes(&self, count: u32) {
        self.faults.write().remaining_write_failures = count;
    }

    /// Make every address-keyed read for `address` fail until cleared.
    pub fn fail_reads_for(&self, address: Address) {
        self.faults.write().failing_addresses.insert(address);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.faults.write().latency = latency;
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        *self.faults.write() = FaultPlan::default();
    }

    /// Number of port calls made so far (including failed ones).
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn utxo_count(&self) -> usize {
        self.state.read().utxos.len()
    }

    pub fn spend_edge_count(&self) -> usize {
        self.state.read().outgoing.values().map(BTreeMap::len).sum()
    }

    pub fn cluster_count(&self) -> usize {
        self.state.read().clusters.len()
    }

    async fn enter(&self, operation: &'static str, address: Option<&Address>) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let latency = {
            let mut faults = self.faults.write();
            if faults.remaining_failures > 0 {
                faults.remaining_failures -= 1;
                return Err(GraphStoreError::unavailable(operation, "injected failure"));
            }
            if operation == "write_batch" && faults.remaining_write_failures > 0 {
                faults.remaining_write_failures -= 1;
                return Err(GraphStoreError::unavailable(operation, "injected write failure"));
            }
            if let Some(address) = address {
                if faults.failing_addresses.contains(address) {
                    return Err(GraphStoreError::unavailable(
                        operation,
                        format!("injected read failure for {address}"),
                    ));
                }
            }
            faults.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }

    // =========================================================================
    // BATCH VALIDATION
    // =========================================================================

    fn validate(state: &GraphState, mutations: &[GraphMutation]) -> StoreResult<()> {
        let mut pending_spends: HashMap<&UtxoId, &TxId> = HashMap::new();
        let mut pending_edges: HashMap<&UtxoId, BTreeMap<&UtxoId, f64>> = HashMap::new();

        for mutation in mutations {
            match mutation {
                GraphMutation::MarkSpent {
                    utxo_id,
                    spending_tx,
                } => {
                    let prior = pending_spends
                        .get(utxo_id)
                        .copied()
                        .or_else(|| state.spent_by.get(utxo_id));
                    if let Some(prior) = prior {
                        if prior != spending_tx {
                            return Err(GraphStoreError::InvariantViolation {
                                utxo_id: utxo_id.to_string(),
                                detail: format!(
                                    "already spent by {prior}, re-spent by {spending_tx}"
                                ),
                            });
                        }
                    }
                    pending_spends.insert(utxo_id, spending_tx);
                }
                GraphMutation::MergeSpendEdge(edge) => {
                    let p = edge.proportion;
                    if !p.is_finite() || p < 0.0 || p > 1.0 + PROPORTION_EPSILON {
                        return Err(GraphStoreError::InvariantViolation {
                            utxo_id: edge.from.to_string(),
                            detail: format!("spend proportion {p} outside [0, 1]"),
                        });
                    }
                    pending_edges
                        .entry(&edge.from)
                        .or_default()
                        .insert(&edge.to, p);
                }
                _ => {}
            }
        }

        for (from, new_edges) in pending_edges {
            let mut total: f64 = new_edges.values().sum();
            if let Some(existing) = state.outgoing.get(from) {
                total += existing
                    .iter()
                    .filter(|(to, _)| !new_edges.contains_key(to))
                    .map(|(_, edge)| edge.proportion)
                    .sum::<f64>();
            }
            if total > 1.0 + PROPORTION_EPSILON {
                return Err(GraphStoreError::InvariantViolation {
                    utxo_id: from.to_string(),
                    detail: format!("outgoing spend proportions sum to {total}"),
                });
            }
        }

        Ok(())
    }

    // =========================================================================
    // APPLY
    // =========================================================================

    fn apply(state: &mut GraphState, mutation: GraphMutation) {
        match mutation {
            GraphMutation::MergeUtxo(mut node) => {
                node.taint_score = clamp_taint(node.taint_score);
                let already_spent = state.spent_by.contains_key(&node.utxo_id)
                    || state.utxos.get(&node.utxo_id).is_some_and(|n| n.spent);
                node.spent |= already_spent;
                for address in &node.owning_addresses {
                    state
                        .address_utxos
                        .entry(address.clone())
                        .or_default()
                        .insert(node.utxo_id.clone());
                }
                state.utxos.insert(node.utxo_id.clone(), node);
            }
            GraphMutation::MarkSpent {
                utxo_id,
                spending_tx,
            } => {
                if let Some(node) = state.utxos.get_mut(&utxo_id) {
                    node.spent = true;
                }
                state.spent_by.insert(utxo_id, spending_tx);
            }
            GraphMutation::SetTaint {
                utxo_id,
                taint_score,
            } => {
                if let Some(node) = state.utxos.get_mut(&utxo_id) {
                    node.taint_score = clamp_taint(taint_score);
                }
            }
            GraphMutation::MergeSpendEdge(edge) => {
                state
                    .incoming
                    .entry(edge.to.clone())
                    .or_default()
                    .insert(edge.from.clone());
                state
                    .outgoing
                    .entry(edge.from.clone())
                    .or_default()
                    .insert(edge.to.clone(), edge);
            }
            GraphMutation::MergeCoSpend { a, b, tx_id } => {
                if a == b {
                    return;
                }
                Self::bump_co_spend(state, &a, &b, &tx_id);
                Self::bump_co_spend(state, &b, &a, &tx_id);
            }
            GraphMutation::MergeChangeLink {
                input_address,
                change_address,
                tx_id,
            } => {
                if input_address == change_address {
                    return;
                }
                let key = (input_address.clone(), change_address.clone());
                let link = state
                    .change_links
                    .entry(key.clone())
                    .or_insert_with(|| ChangeLink {
                        input_address: input_address.clone(),
                        change_address: change_address.clone(),
                        change_count: 0,
                        evidence_tx_ids: BTreeSet::new(),
                    });
                if link.evidence_tx_ids.insert(tx_id) {
                    link.change_count += 1;
                }
                for address in [input_address, change_address] {
                    state
                        .change_index
                        .entry(address)
                        .or_default()
                        .insert(key.clone());
                }
            }
            GraphMutation::RecordTransaction(record) => {
                let tx_id = record.tx_id().clone();
                for address in &record.input_addresses {
                    state
                        .spending_index
                        .entry(address.clone())
                        .or_default()
                        .insert(tx_id.clone());
                }
                for address in record
                    .input_addresses
                    .iter()
                    .cloned()
                    .chain(record.transaction.output_addresses())
                {
                    state
                        .participation
                        .entry(address)
                        .or_default()
                        .insert(tx_id.clone());
                }
                state.transactions.insert(tx_id, record);
            }
            GraphMutation::RecordActivity(activity) => {
                state
                    .activity
                    .entry(activity.address.clone())
                    .or_default()
                    .insert(activity);
            }
            GraphMutation::MergeCluster { mut members } => {
                let absorbed: BTreeSet<ClusterId> = members
                    .iter()
                    .filter_map(|a| state.membership.get(a).cloned())
                    .collect();
                for id in &absorbed {
                    if let Some(existing) = state.clusters.remove(id) {
                        members.extend(existing);
                    }
                }
                let Some(cluster_id) = ClusterId::for_members(&members) else {
                    return;
                };
                for address in &members {
                    state
                        .membership
                        .insert(address.clone(), cluster_id.clone());
                }
                state.clusters.insert(cluster_id, members);
            }
        }
    }

    fn bump_co_spend(state: &mut GraphState, address: &Address, neighbor: &Address, tx_id: &TxId) {
        let row = state
            .co_spend
            .entry(address.clone())
            .or_default()
            .entry(neighbor.clone())
            .or_insert_with(|| CoSpendEdge {
                address: address.clone(),
                neighbor: neighbor.clone(),
                tx_count: 0,
                evidence_tx_ids: BTreeSet::new(),
            });
        if row.evidence_tx_ids.insert(tx_id.clone()) {
            row.tx_count += 1;
        }
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn write_batch(&self, mutations: Vec<GraphMutation>) -> StoreResult<()> {
        self.enter("write_batch", None).await?;
        let mut state = self.state.write();
        if let Err(err) = Self::validate(&state, &mutations) {
            error!(error = %err, mutations = mutations.len(), "Rejected graph batch");
            return Err(err);
        }
        let count = mutations.len();
        for mutation in mutations {
            Self::apply(&mut state, mutation);
        }
        debug!(mutations = count, "Applied graph batch");
        Ok(())
    }

    async fn get_utxos(&self, ids: &[UtxoId]) -> StoreResult<Vec<Option<UtxoNode>>> {
        self.enter("get_utxos", None).await?;
        let state = self.state.read();
        Ok(ids.iter().map(|id| state.utxos.get(id).cloned()).collect())
    }

    async fn outgoing_spends(&self, id: &UtxoId) -> StoreResult<Vec<SpendEdge>> {
        self.enter("outgoing_spends", None).await?;
        let state = self.state.read();
        Ok(state
            .outgoing
            .get(id)
            .map(|edges| edges.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn incoming_spends(&self, id: &UtxoId) -> StoreResult<Vec<SpendEdge>> {
        self.enter("incoming_spends", None).await?;
        let state = self.state.read();
        let Some(sources) = state.incoming.get(id) else {
            return Ok(Vec::new());
        };
        Ok(sources
            .iter()
            .filter_map(|from| state.outgoing.get(from).and_then(|edges| edges.get(id)))
            .cloned()
            .collect())
    }

    async fn address_utxos(
        &self,
        address: &Address,
        spent: Option<bool>,
    ) -> StoreResult<Vec<UtxoNode>> {
        self.enter("address_utxos", Some(address)).await?;
        let state = self.state.read();
        let Some(ids) = state.address_utxos.get(address) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| state.utxos.get(id))
            .filter(|node| spent.map_or(true, |flag| node.spent == flag))
            .cloned()
            .collect())
    }

    async fn co_spend_neighbors(&self, address: &Address) -> StoreResult<Vec<CoSpendEdge>> {
        self.enter("co_spend_neighbors", Some(address)).await?;
        let state = self.state.read();
        Ok(state
            .co_spend
            .get(address)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn change_links(&self, address: &Address) -> StoreResult<Vec<ChangeLink>> {
        self.enter("change_links", Some(address)).await?;
        let state = self.state.read();
        let Some(keys) = state.change_index.get(address) else {
            return Ok(Vec::new());
        };
        Ok(keys
            .iter()
            .filter_map(|key| state.change_links.get(key))
            .cloned()
            .collect())
    }

    async fn address_activity(&self, address: &Address) -> StoreResult<Vec<AddressActivity>> {
        self.enter("address_activity", Some(address)).await?;
        let state = self.state.read();
        let mut rows: Vec<AddressActivity> = state
            .activity
            .get(address)
            .map(|rows| rows.iter().cloned().collect())
            .unwrap_or_default();
        rows.sort_by_key(|row| row.timestamp);
        Ok(rows)
    }

    async fn address_counterparties(&self, address: &Address) -> StoreResult<BTreeSet<Address>> {
        self.enter("address_counterparties", Some(address)).await?;
        let state = self.state.read();
        let mut counterparties = BTreeSet::new();
        for tx_id in state.participation.get(address).into_iter().flatten() {
            if let Some(record) = state.transactions.get(tx_id) {
                counterparties.extend(record.input_addresses.iter().cloned());
                counterparties.extend(record.transaction.output_addresses());
            }
        }
        counterparties.remove(address);
        Ok(counterparties)
    }

    async fn spending_transactions(
        &self,
        address: &Address,
    ) -> StoreResult<Vec<TransactionRecord>> {
        self.enter("spending_transactions", Some(address)).await?;
        let state = self.state.read();
        let mut records: Vec<TransactionRecord> = state
            .spending_index
            .get(address)
            .into_iter()
            .flatten()
            .filter_map(|tx_id| state.transactions.get(tx_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            (a.transaction.block_height, a.transaction.timestamp)
                .cmp(&(b.transaction.block_height, b.transaction.timestamp))
        });
        Ok(records)
    }

    async fn get_transaction(&self, tx_id: &TxId) -> StoreResult<Option<TransactionRecord>> {
        self.enter("get_transaction", None).await?;
        Ok(self.state.read().transactions.get(tx_id).cloned())
    }

    async fn cluster_of(&self, address: &Address) -> StoreResult<Option<ClusterId>> {
        self.enter("cluster_of", Some(address)).await?;
        Ok(self.state.read().membership.get(address).cloned())
    }

    async fn cluster_members(&self, cluster_id: &ClusterId) -> StoreResult<BTreeSet<Address>> {
        self.enter("cluster_members", None).await?;
        Ok(self
            .state
            .read()
            .clusters
            .get(cluster_id)
            .cloned()
            .unwrap_or_default())
    }
}
