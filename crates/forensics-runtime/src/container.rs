//! # Service Container
//!
//! Builds every engine over one shared, retrying graph store and records
//! metrics from the reports they return.

use crate::config::ForensicsConfig;
use crate::ingestion::IngestionPipeline;
use cf_03_address_clustering::{
    ClusteringApi, ClusteringReport, ClusteringResult, ClusteringService,
};
use cf_04_graph_query::{FlowTrace, GraphQueryService, QueryApi, QueryResult};
use forensics_telemetry::{
    metric_inc, CLUSTER_MERGES, HEURISTIC_FAILURES, TRAVERSALS_TRUNCATED, TRAVERSAL_NODES,
};
use shared_graph_store::{GraphStore, InMemoryGraphStore, ResilientGraphStore};
use shared_types::{Address, UtxoId};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The store stack the binary runs on.
pub type ForensicsStore = ResilientGraphStore<InMemoryGraphStore>;

/// Every engine, sharing one store.
pub struct ForensicsContainer<S: GraphStore = ForensicsStore> {
    store: Arc<S>,
    ingestion: IngestionPipeline<S>,
    clustering: ClusteringService<S>,
    query: GraphQueryService<S>,
    shutdown: CancellationToken,
}

impl ForensicsContainer<ForensicsStore> {
    /// In-memory store wrapped in the retry/timeout decorator.
    pub fn in_memory(config: &ForensicsConfig) -> Self {
        let store = ResilientGraphStore::new(
            Arc::new(InMemoryGraphStore::new()),
            config.store.retry_policy(),
            config.store.query_timeout(),
        );
        Self::with_store(Arc::new(store), config)
    }
}

impl<S: GraphStore> ForensicsContainer<S> {
    pub fn with_store(store: Arc<S>, config: &ForensicsConfig) -> Self {
        let shutdown = CancellationToken::new();
        info!(
            taint_model = config.taint.model.name(),
            mixer_threshold = config.clustering.mixer_threshold,
            max_traversal_nodes = config.query.max_traversal_nodes,
            "Forensic services ready"
        );
        Self {
            ingestion: IngestionPipeline::new(
                Arc::clone(&store),
                config.taint,
                config.ingestion.clone(),
            ),
            clustering: ClusteringService::new(Arc::clone(&store), config.clustering.clone()),
            query: GraphQueryService::new(Arc::clone(&store), config.query.clone())
                .with_shutdown(shutdown.child_token()),
            store,
            shutdown,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn ingestion(&self) -> &IngestionPipeline<S> {
        &self.ingestion
    }

    pub fn clustering(&self) -> &ClusteringService<S> {
        &self.clustering
    }

    pub fn query(&self) -> &GraphQueryService<S> {
        &self.query
    }

    /// Run a clustering pass and record merge and failure counts.
    pub async fn cluster_addresses(
        &self,
        seeds: &[Address],
        depth: usize,
    ) -> ClusteringResult<ClusteringReport> {
        let report = self.clustering.cluster_addresses(seeds, depth).await?;
        CLUSTER_MERGES.inc_by(report.merges as f64);
        for failure in &report.failures {
            metric_inc!(HEURISTIC_FAILURES, &[&failure.heuristic.to_string()]);
        }
        Ok(report)
    }

    /// Forward trace with traversal metrics.
    pub async fn trace_utxo_flow(&self, start: &UtxoId, max_hops: usize) -> QueryResult<FlowTrace> {
        let trace = self.query.trace_utxo_flow(start, max_hops).await?;
        record_trace(&trace);
        Ok(trace)
    }

    /// Backward trace with traversal metrics.
    pub async fn trace_utxo_sources(&self, start: &UtxoId, max_hops: usize) -> QueryResult<FlowTrace> {
        let trace = self.query.trace_utxo_sources(start, max_hops).await?;
        record_trace(&trace);
        Ok(trace)
    }

    /// Cancel in-flight and future traversals.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

fn record_trace(trace: &FlowTrace) {
    TRAVERSAL_NODES.observe(trace.nodes.len() as f64);
    if trace.truncated {
        metric_inc!(TRAVERSALS_TRUNCATED);
    }
}
