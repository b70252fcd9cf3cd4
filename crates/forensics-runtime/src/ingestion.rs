//! # Ingestion Pipeline
//!
//! Persists one transaction end to end:
//!
//! ```text
//! RawTransaction ─→ normalize ─→ load inputs ─→ detect change
//!                                     │               │
//!                                     └─→ propagate ←─┘
//!                                             │
//!         taint mutations + clustering evidence ─→ one write_batch
//! ```
//!
//! Every mutation for a transaction goes out in a single batch, so a
//! failed write leaves no partial state behind.

use crate::config::IngestionConfig;
use cf_01_transaction_normalizer::{normalize, NormalizeError, RawBlock, RawTransaction};
use cf_02_taint_propagation::{TaintConfig, TaintError, TaintPropagationService};
use cf_03_address_clustering::{detect_change, transaction_evidence};
use forensics_telemetry::{
    metric_inc, HistogramTimer, INGEST_DURATION, INVARIANT_VIOLATIONS, MISSING_INPUTS,
    TRANSACTIONS_PROCESSED,
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use shared_graph_store::GraphStore;
use shared_types::{GraphStoreError, TxId};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

// =============================================================================
// EVENTS AND RESULTS
// =============================================================================

/// One transaction to ingest, with its containing block when known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionEvent {
    #[serde(alias = "tx")]
    pub transaction: RawTransaction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<RawBlock>,
}

impl IngestionEvent {
    pub fn unconfirmed(transaction: RawTransaction) -> Self {
        Self {
            transaction,
            block: None,
        }
    }
}

/// What one saved transaction contributed to the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSummary {
    pub tx_hash: TxId,
    pub inputs_processed: usize,
    pub outputs_created: usize,
    pub is_coinjoin: bool,
    pub co_spend_edges: usize,
    pub change_output: Option<u32>,
    /// Inputs whose source output was not in the graph.
    pub missing_inputs: usize,
    pub fee_taint: f64,
}

/// Ingestion failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error(transparent)]
    Malformed(#[from] NormalizeError),

    #[error(transparent)]
    Taint(#[from] TaintError),

    #[error("Failed to persist transaction: {0}")]
    Store(#[from] GraphStoreError),
}

impl IngestError {
    pub fn is_invariant_violation(&self) -> bool {
        match self {
            IngestError::Malformed(_) => false,
            IngestError::Taint(e) => e.is_invariant_violation(),
            IngestError::Store(e) => matches!(e, GraphStoreError::InvariantViolation { .. }),
        }
    }

    /// Metric label for this failure.
    pub fn outcome(&self) -> &'static str {
        match self {
            IngestError::Malformed(_) => "rejected",
            _ if self.is_invariant_violation() => "invariant_violation",
            _ => "failed",
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

// =============================================================================
// PIPELINE
// =============================================================================

/// Normalizes, propagates and persists transactions.
pub struct IngestionPipeline<S: GraphStore> {
    store: Arc<S>,
    taint: TaintPropagationService<S>,
    config: IngestionConfig,
}

impl<S: GraphStore> IngestionPipeline<S> {
    pub fn new(store: Arc<S>, taint: TaintConfig, config: IngestionConfig) -> Self {
        Self {
            taint: TaintPropagationService::new(Arc::clone(&store), taint),
            store,
            config,
        }
    }

    /// The taint service sharing this pipeline's store.
    pub fn taint(&self) -> &TaintPropagationService<S> {
        &self.taint
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    /// Ingest one transaction and record its outcome.
    pub async fn save_bitcoin_transaction(&self, event: &IngestionEvent) -> IngestResult<SaveSummary> {
        let span = info_span!(
            "ingest",
            ingest_id = %Uuid::new_v4(),
            tx_id = %event.transaction.txid
        );
        async {
            let _timer = HistogramTimer::new(&INGEST_DURATION);
            let result = self.save(event).await;
            record_outcome(&result);
            result
        }
        .instrument(span)
        .await
    }

    /// Ingest a block's transactions in order. A failed transaction is
    /// reported and the rest of the block still runs.
    pub async fn ingest_block(
        &self,
        block: &RawBlock,
        transactions: &[RawTransaction],
    ) -> Vec<IngestResult<SaveSummary>> {
        let mut results = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            let event = IngestionEvent {
                transaction: transaction.clone(),
                block: Some(block.clone()),
            };
            results.push(self.save_bitcoin_transaction(&event).await);
        }
        results
    }

    /// Ingest independent transactions with bounded concurrency. Results
    /// come back in input order.
    ///
    /// Events that spend each other's outputs must go through
    /// [`ingest_block`](Self::ingest_block) instead.
    pub async fn ingest_concurrent(&self, events: &[IngestionEvent]) -> Vec<IngestResult<SaveSummary>> {
        stream::iter(events)
            .map(|event| self.save_bitcoin_transaction(event))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    async fn save(&self, event: &IngestionEvent) -> IngestResult<SaveSummary> {
        let tx = normalize(&event.transaction, event.block.as_ref())?;
        let inputs = self.taint.load_inputs(&tx).await?;
        let input_addresses = TaintPropagationService::<S>::input_addresses(&tx, &inputs);

        let change = if self.config.detect_change {
            detect_change(&tx, &input_addresses)
        } else {
            None
        };
        let tx = match &change {
            Some(detection) => tx.with_change_output(detection.output_index),
            None => tx,
        };

        let outcome = self.taint.propagate_loaded(&tx, &inputs)?;
        let evidence = transaction_evidence(&tx, &input_addresses);

        let mut mutations = TaintPropagationService::<S>::propagation_mutations(&tx, &outcome);
        mutations.extend(evidence.mutations);
        debug!(mutations = mutations.len(), "Writing transaction batch");
        self.store.write_batch(mutations).await?;

        Ok(SaveSummary {
            tx_hash: tx.tx_id.clone(),
            inputs_processed: tx.inputs.len(),
            outputs_created: tx.outputs.len(),
            is_coinjoin: tx.is_coinjoin,
            co_spend_edges: evidence.co_spend_pairs,
            change_output: change.map(|c| c.output_index),
            missing_inputs: outcome.missing_inputs(),
            fee_taint: outcome.fee_taint,
        })
    }
}

fn record_outcome(result: &IngestResult<SaveSummary>) {
    match result {
        Ok(summary) => {
            metric_inc!(TRANSACTIONS_PROCESSED, &["ingested"]);
            MISSING_INPUTS.inc_by(summary.missing_inputs as f64);
        }
        Err(err) => {
            metric_inc!(TRANSACTIONS_PROCESSED, &[err.outcome()]);
            if err.is_invariant_violation() {
                metric_inc!(INVARIANT_VIOLATIONS, &["ingestion"]);
                error!(error = %err, "Transaction rejected: invariant violated");
            } else {
                warn!(error = %err, "Transaction not ingested");
            }
        }
    }
}
