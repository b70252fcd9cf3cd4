//! Clustering Service - heuristics over the graph store.

use crate::domain::confidence::{
    change_link_probability, co_spend_probability, combine, temporal_probability,
    LIKELY_SAME_OWNER_THRESHOLD, SAME_CLUSTER_CONFIDENCE,
};
use crate::domain::{
    peel_of, sync_count, ClusterEntityType, ClusterEvidence, ClusterStats, ClusteringReport,
    Heuristic, HeuristicFailure, OwnershipAssessment, OwnershipEvidence, PeelEntityType,
    PeelingChainReport, UnionFind,
};
use crate::domain::peeling::MIN_CHAIN_PEELS;
use crate::error::{ClusteringError, ClusteringResult};
use crate::ports::inbound::ClusteringApi;
use crate::types::ClusteringConfig;
use async_trait::async_trait;
use shared_graph_store::{GraphMutation, GraphStore};
use shared_types::{
    Address, AddressActivity, Amount, ClusterId, GraphStoreError, StoreResult, UtxoId,
};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Working state of one `cluster_addresses` call.
#[derive(Default)]
struct RunState {
    uf: UnionFind,
    report: ClusteringReport,
    queue: VecDeque<(Address, usize)>,
    expanded: HashSet<Address>,
    /// (heuristic, a, b) already recorded as evidence this run.
    noted: HashSet<(Heuristic, Address, Address)>,
    activity: HashMap<Address, Vec<AddressActivity>>,
}

impl RunState {
    fn union(&mut self, a: &Address, b: &Address) {
        if self.uf.union(a, b) {
            self.report.merges += 1;
        }
    }

    fn note(&mut self, heuristic: Heuristic, a: &Address, b: &Address, evidence: ClusterEvidence) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        if self.noted.insert((heuristic, low.clone(), high.clone())) {
            self.report.evidence.push(evidence);
        }
    }

    fn fail(&mut self, heuristic: Heuristic, address: &Address, error: GraphStoreError) {
        warn!(
            heuristic = %heuristic,
            address = %address,
            error = %error,
            "Clustering heuristic failed, continuing"
        );
        self.report.failures.push(HeuristicFailure {
            heuristic,
            address: address.clone(),
            error: error.to_string(),
        });
    }
}

/// Address clustering over an injected graph store.
pub struct ClusteringService<S: GraphStore> {
    store: Arc<S>,
    config: ClusteringConfig,
    /// Serializes the read-merge-persist phase of clustering runs.
    write_lock: Mutex<()>,
}

impl<S: GraphStore> ClusteringService<S> {
    pub fn new(store: Arc<S>, config: ClusteringConfig) -> Self {
        Self {
            store,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    fn enqueue(&self, state: &mut RunState, address: &Address, level: usize) {
        if state.expanded.contains(address) {
            return;
        }
        if state.expanded.len() >= self.config.max_addresses_per_run {
            state.report.truncated = true;
            return;
        }
        state.expanded.insert(address.clone());
        state.queue.push_back((address.clone(), level));
    }

    async fn activity_of(
        &self,
        state: &mut RunState,
        address: &Address,
    ) -> StoreResult<Vec<AddressActivity>> {
        if let Some(cached) = state.activity.get(address) {
            return Ok(cached.clone());
        }
        let rows = self.store.address_activity(address).await?;
        state.activity.insert(address.clone(), rows.clone());
        Ok(rows)
    }

    /// Run every heuristic for one address.
    ///
    /// Addresses at `level == depth` still record evidence, but their
    /// heuristic neighbours lie past the hop bound and are not merged.
    async fn visit(&self, state: &mut RunState, address: &Address, level: usize, depth: usize) {
        state.uf.insert(address);
        let within = level < depth;

        match self.store.cluster_of(address).await {
            Ok(Some(cluster_id)) => match self.store.cluster_members(&cluster_id).await {
                Ok(members) => {
                    for member in &members {
                        state.union(address, member);
                    }
                    state.report.evidence.push(ClusterEvidence::ExistingCluster {
                        address: address.clone(),
                        cluster_id,
                    });
                }
                Err(err) => state.fail(Heuristic::ExistingCluster, address, err),
            },
            Ok(None) => {}
            Err(err) => state.fail(Heuristic::ExistingCluster, address, err),
        }

        let mut candidates = BTreeSet::new();

        match self.store.co_spend_neighbors(address).await {
            Ok(rows) => {
                for row in rows {
                    let merged = within && row.tx_count <= self.config.mixer_threshold;
                    if merged {
                        state.union(address, &row.neighbor);
                        self.enqueue(state, &row.neighbor, level + 1);
                    }
                    state.note(
                        Heuristic::CoSpend,
                        address,
                        &row.neighbor,
                        ClusterEvidence::CoSpend {
                            address: address.clone(),
                            neighbor: row.neighbor.clone(),
                            tx_count: row.tx_count,
                            merged,
                        },
                    );
                    candidates.insert(row.neighbor);
                }
            }
            Err(err) => state.fail(Heuristic::CoSpend, address, err),
        }

        match self.store.change_links(address).await {
            Ok(links) => {
                for link in links {
                    let other = link.other(address).clone();
                    let merged =
                        within && link.change_count >= self.config.change_merge_threshold;
                    if merged {
                        state.union(address, &other);
                        self.enqueue(state, &other, level + 1);
                    }
                    state.note(
                        Heuristic::ChangeAddress,
                        &link.input_address,
                        &link.change_address,
                        ClusterEvidence::ChangeLink {
                            input_address: link.input_address.clone(),
                            change_address: link.change_address.clone(),
                            change_count: link.change_count,
                            merged,
                        },
                    );
                    candidates.insert(other);
                }
            }
            Err(err) => state.fail(Heuristic::ChangeAddress, address, err),
        }

        self.correlate_in_time(state, address, candidates, level, within)
            .await;
    }

    async fn correlate_in_time(
        &self,
        state: &mut RunState,
        address: &Address,
        mut candidates: BTreeSet<Address>,
        level: usize,
        within: bool,
    ) {
        match self.store.address_counterparties(address).await {
            Ok(counterparties) => candidates.extend(counterparties),
            Err(err) => state.fail(Heuristic::Temporal, address, err),
        }
        candidates.remove(address);

        let own = match self.activity_of(state, address).await {
            Ok(rows) if rows.is_empty() => return,
            Ok(rows) => rows,
            Err(err) => {
                state.fail(Heuristic::Temporal, address, err);
                return;
            }
        };

        for candidate in candidates
            .into_iter()
            .take(self.config.max_temporal_candidates)
        {
            if state.uf.connected(address, &candidate) {
                continue;
            }
            let theirs = match self.activity_of(state, &candidate).await {
                Ok(rows) => rows,
                Err(err) => {
                    state.fail(Heuristic::Temporal, &candidate, err);
                    continue;
                }
            };
            let sync = sync_count(&own, &theirs, self.config.temporal_window_secs);
            if sync == 0 {
                continue;
            }
            let merged = within && sync >= self.config.temporal_sync_threshold;
            if merged {
                state.union(address, &candidate);
                self.enqueue(state, &candidate, level + 1);
            }
            state.note(
                Heuristic::Temporal,
                address,
                &candidate,
                ClusterEvidence::Temporal {
                    address: address.clone(),
                    candidate: candidate.clone(),
                    sync_count: sync,
                    merged,
                },
            );
        }
    }
}

#[async_trait]
impl<S: GraphStore> ClusteringApi for ClusteringService<S> {
    async fn cluster_addresses(
        &self,
        seeds: &[Address],
        depth: usize,
    ) -> ClusteringResult<ClusteringReport> {
        if seeds.is_empty() {
            return Err(ClusteringError::NoSeeds);
        }
        let _writer = self.write_lock.lock().await;

        let mut state = RunState::default();
        for seed in seeds {
            self.enqueue(&mut state, seed, 0);
        }
        while let Some((address, level)) = state.queue.pop_front() {
            self.visit(&mut state, &address, level, depth).await;
        }

        let mut mutations = Vec::new();
        for group in state.uf.groups() {
            if group.len() < 2 {
                state.report.unclustered.extend(group);
                continue;
            }
            if let Some(cluster_id) = ClusterId::for_members(&group) {
                mutations.push(GraphMutation::MergeCluster {
                    members: group.clone(),
                });
                state.report.clusters.insert(cluster_id, group);
            }
        }

        let clusters = mutations.len();
        if clusters > 0 {
            self.store
                .write_batch(mutations)
                .await
                .map_err(|source| ClusteringError::Persist { clusters, source })?;
        }

        info!(
            seeds = seeds.len(),
            touched = state.uf.len(),
            clusters,
            merges = state.report.merges,
            failures = state.report.failures.len(),
            truncated = state.report.truncated,
            "Clustering run complete"
        );
        Ok(state.report)
    }

    async fn find_common_ownership(
        &self,
        a: &Address,
        b: &Address,
    ) -> ClusteringResult<OwnershipAssessment> {
        let assessment = |confidence: f64, evidence: Vec<OwnershipEvidence>| OwnershipAssessment {
            address_a: a.clone(),
            address_b: b.clone(),
            likely_same_owner: confidence >= LIKELY_SAME_OWNER_THRESHOLD,
            confidence,
            evidence,
        };
        if a == b {
            return Ok(assessment(1.0, Vec::new()));
        }

        let cluster_a = self.store.cluster_of(a).await?;
        let cluster_b = self.store.cluster_of(b).await?;
        if let (Some(ca), Some(cb)) = (&cluster_a, &cluster_b) {
            if ca == cb {
                return Ok(assessment(
                    SAME_CLUSTER_CONFIDENCE,
                    vec![OwnershipEvidence::SameCluster {
                        cluster_id: ca.clone(),
                    }],
                ));
            }
        }

        let mut evidence = Vec::new();
        let mut probabilities = Vec::new();

        let co_spend = self.store.co_spend_neighbors(a).await?;
        if let Some(row) = co_spend.iter().find(|row| &row.neighbor == b) {
            match co_spend_probability(row.tx_count, self.config.mixer_threshold) {
                Some(p) => {
                    probabilities.push(p);
                    evidence.push(OwnershipEvidence::CoSpend {
                        tx_count: row.tx_count,
                        probability: p,
                        excluded_as_mixer: false,
                    });
                }
                None => evidence.push(OwnershipEvidence::CoSpend {
                    tx_count: row.tx_count,
                    probability: 0.0,
                    excluded_as_mixer: true,
                }),
            }
        }

        let change_count: u64 = self
            .store
            .change_links(a)
            .await?
            .iter()
            .filter(|link| link.other(a) == b)
            .map(|link| link.change_count)
            .sum();
        if change_count > 0 {
            let p = change_link_probability(change_count);
            probabilities.push(p);
            evidence.push(OwnershipEvidence::ChangeLink {
                change_count,
                probability: p,
            });
        }

        let activity_a = self.store.address_activity(a).await?;
        let activity_b = self.store.address_activity(b).await?;
        let sync = sync_count(&activity_a, &activity_b, self.config.temporal_window_secs);
        if sync > 0 {
            let p = temporal_probability(sync, self.config.temporal_sync_threshold);
            probabilities.push(p);
            evidence.push(OwnershipEvidence::Temporal {
                sync_count: sync,
                probability: p,
            });
        }

        let confidence = combine(probabilities);
        debug!(address_a = %a, address_b = %b, confidence, "Assessed common ownership");
        Ok(assessment(confidence, evidence))
    }

    async fn detect_peeling_chain(&self, address: &Address) -> ClusteringResult<PeelingChainReport> {
        let mut queue = VecDeque::from([address.clone()]);
        let mut seen = HashSet::new();
        let mut visited = Vec::new();
        let mut ratios = Vec::new();

        while let Some(current) = queue.pop_front() {
            if visited.len() >= self.config.peel_max_hops {
                break;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            let records = match self.store.spending_transactions(&current).await {
                Ok(records) => records,
                Err(err) if &current == address => return Err(err.into()),
                Err(err) => {
                    warn!(
                        heuristic = %Heuristic::PeelingChain,
                        address = %current,
                        error = %err,
                        "Stopped following peel successor"
                    );
                    continue;
                }
            };
            visited.push(current.clone());

            for record in &records {
                let Some(peel) = peel_of(record) else {
                    continue;
                };
                ratios.push(peel.change_ratio);
                for next in peel.change_addresses {
                    if next != current && !seen.contains(&next) {
                        queue.push_back(next);
                    }
                }
            }
        }

        let peel_count = ratios.len() as u64;
        let avg_change_ratio = if ratios.is_empty() {
            0.0
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        };
        Ok(PeelingChainReport {
            address: address.clone(),
            is_peeling_chain: peel_count >= MIN_CHAIN_PEELS,
            peel_count,
            avg_change_ratio,
            likely_entity_type: PeelEntityType::classify(peel_count, avg_change_ratio),
            visited,
        })
    }

    async fn calculate_cluster_stats(
        &self,
        cluster_id: &ClusterId,
    ) -> ClusteringResult<Option<ClusterStats>> {
        let members = self.store.cluster_members(cluster_id).await?;
        if members.is_empty() {
            return Ok(None);
        }

        let mut utxos: HashSet<UtxoId> = HashSet::new();
        let mut total: u128 = 0;
        for member in &members {
            for node in self.store.address_utxos(member, Some(false)).await? {
                if utxos.insert(node.utxo_id.clone()) {
                    total += node.value.base_units() as u128;
                }
            }
        }

        Ok(Some(ClusterStats {
            cluster_id: cluster_id.clone(),
            size: members.len(),
            total_balance: Amount::from_base_units(u64::try_from(total).unwrap_or(u64::MAX)),
            total_utxos: utxos.len(),
            entity_type: ClusterEntityType::from_size(members.len()),
        }))
    }
}
