//! Graph Query Service - bounded traversals over the graph store.

use crate::domain::{
    ClusterMembership, FlowPath, FlowTrace, PathIndex, SpendingChain, TraceBuilder,
    TraceDirection,
};
use crate::error::{QueryError, QueryResult};
use crate::ports::inbound::QueryApi;
use crate::types::QueryConfig;
use async_trait::async_trait;
use shared_graph_store::GraphStore;
use shared_types::{Address, SpendEdge, UtxoId, UtxoNode};
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Read-only graph queries over an injected graph store.
pub struct GraphQueryService<S: GraphStore> {
    store: Arc<S>,
    config: QueryConfig,
    shutdown: CancellationToken,
}

impl<S: GraphStore> GraphQueryService<S> {
    pub fn new(store: Arc<S>, config: QueryConfig) -> Self {
        Self {
            store,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Tie running traversals to an external shutdown token.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Token that aborts every traversal in flight when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Run `query` under the shutdown token and the traversal timeout.
    async fn guarded<T, F>(&self, operation: &'static str, query: F) -> QueryResult<T>
    where
        F: Future<Output = QueryResult<T>>,
    {
        let timeout = self.config.traversal_timeout();
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(QueryError::Cancelled { operation }),
            result = tokio::time::timeout(timeout, query) => match result {
                Ok(result) => result,
                Err(_) => Err(QueryError::TimedOut {
                    operation,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            },
        }
    }

    async fn edges(&self, direction: TraceDirection, id: &UtxoId) -> QueryResult<Vec<SpendEdge>> {
        let edges = match direction {
            TraceDirection::Forward => self.store.outgoing_spends(id).await?,
            TraceDirection::Backward => self.store.incoming_spends(id).await?,
        };
        Ok(edges)
    }

    /// Level-by-level BFS from `roots`. Each level's unseen outputs are
    /// fetched with one multi-key read.
    async fn trace(
        &self,
        roots: Vec<UtxoNode>,
        direction: TraceDirection,
        max_hops: usize,
    ) -> QueryResult<FlowTrace> {
        let mut builder = TraceBuilder::new(direction, self.config.max_traversal_nodes);
        let mut frontier: Vec<UtxoId> = roots
            .into_iter()
            .filter_map(|node| {
                let id = node.utxo_id.clone();
                builder.admit_root(node).then_some(id)
            })
            .collect();

        let mut hop = 0;
        while hop < max_hops && !frontier.is_empty() && !builder.is_truncated() {
            hop += 1;
            let mut pending = Vec::new();
            for id in &frontier {
                pending.extend(self.edges(direction, id).await?);
            }

            let unseen: Vec<UtxoId> = pending
                .iter()
                .map(|edge| direction.far_end(edge))
                .filter(|id| !builder.contains(id))
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let mut next = Vec::with_capacity(unseen.len());
            if !unseen.is_empty() {
                for node in self.store.get_utxos(&unseen).await?.into_iter().flatten() {
                    let id = node.utxo_id.clone();
                    if builder.admit(node, hop) {
                        next.push(id);
                    } else if builder.is_truncated() {
                        break;
                    }
                }
            }
            for edge in pending {
                builder.link(edge);
            }
            frontier = next;
        }

        let trace = builder.finish();
        debug!(
            direction = ?trace.direction,
            nodes = trace.nodes.len(),
            edges = trace.edges.len(),
            hops = trace.hops,
            truncated = trace.truncated,
            "Traced flow"
        );
        Ok(trace)
    }

    async fn trace_from(
        &self,
        start: &UtxoId,
        direction: TraceDirection,
        max_hops: usize,
    ) -> QueryResult<FlowTrace> {
        match self.store.get_utxo(start).await? {
            Some(root) => self.trace(vec![root], direction, max_hops).await,
            None => Ok(FlowTrace::empty(direction)),
        }
    }

    async fn shortest_path(
        &self,
        from: &UtxoId,
        to: &UtxoId,
        max_hops: usize,
    ) -> QueryResult<Option<FlowPath>> {
        let Some(source) = self.store.get_utxo(from).await? else {
            return Ok(None);
        };
        if from == to {
            return Ok(Some(FlowPath {
                nodes: vec![source],
                edges: Vec::new(),
            }));
        }

        let mut index = PathIndex::new();
        let mut visited = HashSet::from([from.clone()]);
        let mut frontier = vec![from.clone()];
        let mut hop = 0;
        while hop < max_hops && !frontier.is_empty() {
            hop += 1;
            let mut next = Vec::new();
            for id in &frontier {
                for edge in self.store.outgoing_spends(id).await? {
                    if visited.len() >= self.config.max_traversal_nodes {
                        debug!(from = %from, to = %to, "Path search hit the node cap");
                        return Ok(None);
                    }
                    if !visited.insert(edge.to.clone()) {
                        continue;
                    }
                    let reached = edge.to.clone();
                    index.reach(edge);
                    if &reached == to {
                        return self.materialize(index.route_to(to)).await;
                    }
                    next.push(reached);
                }
            }
            frontier = next;
        }
        Ok(None)
    }

    async fn materialize(&self, edges: Vec<SpendEdge>) -> QueryResult<Option<FlowPath>> {
        let Some(first) = edges.first() else {
            return Ok(None);
        };
        let ids: Vec<UtxoId> = std::iter::once(first.from.clone())
            .chain(edges.iter().map(|e| e.to.clone()))
            .collect();
        let nodes: Option<Vec<UtxoNode>> = self.store.get_utxos(&ids).await?.into_iter().collect();
        Ok(nodes.map(|nodes| FlowPath { nodes, edges }))
    }
}

#[async_trait]
impl<S: GraphStore> QueryApi for GraphQueryService<S> {
    async fn get_utxo_history(&self, utxo_id: &UtxoId) -> QueryResult<Option<SpendingChain>> {
        let trace = self
            .guarded(
                "get_utxo_history",
                self.trace_from(utxo_id, TraceDirection::Forward, usize::MAX),
            )
            .await?;
        Ok(SpendingChain::from_trace(trace))
    }

    async fn get_address_utxos(
        &self,
        address: &Address,
        spent: Option<bool>,
    ) -> QueryResult<Vec<UtxoNode>> {
        Ok(self.store.address_utxos(address, spent).await?)
    }

    async fn trace_utxo_flow(&self, start: &UtxoId, max_hops: usize) -> QueryResult<FlowTrace> {
        self.guarded(
            "trace_utxo_flow",
            self.trace_from(start, TraceDirection::Forward, max_hops),
        )
        .await
    }

    async fn trace_utxo_sources(
        &self,
        start: &UtxoId,
        max_hops: usize,
    ) -> QueryResult<FlowTrace> {
        self.guarded(
            "trace_utxo_sources",
            self.trace_from(start, TraceDirection::Backward, max_hops),
        )
        .await
    }

    async fn trace_address_flow(
        &self,
        address: &Address,
        max_hops: usize,
    ) -> QueryResult<FlowTrace> {
        self.guarded("trace_address_flow", async {
            let roots = self.store.address_utxos(address, None).await?;
            self.trace(roots, TraceDirection::Forward, max_hops).await
        })
        .await
    }

    async fn find_flow_path(
        &self,
        from: &UtxoId,
        to: &UtxoId,
        max_hops: usize,
    ) -> QueryResult<Option<FlowPath>> {
        self.guarded("find_flow_path", self.shortest_path(from, to, max_hops))
            .await
    }

    async fn find_clustered_addresses(
        &self,
        address: &Address,
        min_tx_count: u64,
    ) -> QueryResult<Vec<Address>> {
        let mut rows: Vec<_> = self
            .store
            .co_spend_neighbors(address)
            .await?
            .into_iter()
            .filter(|row| row.tx_count >= min_tx_count && &row.neighbor != address)
            .collect();
        rows.sort_by(|a, b| {
            b.tx_count
                .cmp(&a.tx_count)
                .then_with(|| a.neighbor.cmp(&b.neighbor))
        });
        Ok(rows.into_iter().map(|row| row.neighbor).collect())
    }

    async fn get_cluster_members(
        &self,
        address: &Address,
    ) -> QueryResult<Option<ClusterMembership>> {
        let Some(cluster_id) = self.store.cluster_of(address).await? else {
            return Ok(None);
        };
        let members = self.store.cluster_members(&cluster_id).await?;
        Ok(Some(ClusterMembership {
            cluster_id,
            members,
        }))
    }
}
