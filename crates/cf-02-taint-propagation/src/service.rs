//! Taint Propagation Service - store-facing orchestration.

use crate::domain::{propagate, PropagationOutcome, PropagationWarning};
use crate::error::{TaintError, TaintResult};
use crate::ports::inbound::TaintApi;
use crate::types::TaintConfig;
use async_trait::async_trait;
use shared_graph_store::{GraphMutation, GraphStore};
use shared_types::{Address, FlowTransaction, UtxoId, UtxoNode};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Taint propagation over an injected graph store.
pub struct TaintPropagationService<S: GraphStore> {
    store: Arc<S>,
    config: TaintConfig,
}

impl<S: GraphStore> TaintPropagationService<S> {
    pub fn new(store: Arc<S>, config: TaintConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &TaintConfig {
        &self.config
    }

    /// Read every output `tx` consumes in one snapshot.
    pub async fn load_inputs(&self, tx: &FlowTransaction) -> TaintResult<Vec<Option<UtxoNode>>> {
        if tx.is_coinbase || tx.inputs.is_empty() {
            return Ok(Vec::new());
        }
        let outpoints: Vec<UtxoId> = tx.inputs.iter().map(|i| i.outpoint()).collect();
        Ok(self.store.get_utxos(&outpoints).await?)
    }

    /// Owners of the consumed outputs, from the graph or the inline prevout.
    pub fn input_addresses(
        tx: &FlowTransaction,
        input_utxos: &[Option<UtxoNode>],
    ) -> BTreeSet<Address> {
        tx.inputs
            .iter()
            .enumerate()
            .flat_map(|(i, input)| {
                match (input_utxos.get(i).and_then(Option::as_ref), &input.prevout) {
                    (Some(node), _) => node.owning_addresses.clone(),
                    (None, Some(prevout)) => prevout.addresses.clone(),
                    (None, None) => BTreeSet::new(),
                }
            })
            .collect()
    }

    /// Run the pure propagation with this service's configuration and log
    /// what it reports.
    pub fn propagate_loaded(
        &self,
        tx: &FlowTransaction,
        input_utxos: &[Option<UtxoNode>],
    ) -> TaintResult<PropagationOutcome> {
        let outcome = propagate(tx, input_utxos, &self.config).inspect_err(|err| {
            if err.is_invariant_violation() {
                error!(tx_id = %tx.tx_id, error = %err, "Taint propagation invariant violated");
            }
        })?;

        for warning in &outcome.warnings {
            match warning {
                PropagationWarning::MissingInput {
                    outpoint,
                    value,
                    value_source,
                } => warn!(
                    tx_id = %tx.tx_id,
                    utxo_id = %outpoint,
                    value = %value,
                    ?value_source,
                    "Input not in graph, treated as untainted"
                ),
                PropagationWarning::FeeMismatch {
                    declared,
                    effective,
                } => debug!(
                    tx_id = %tx.tx_id,
                    declared = %declared,
                    effective = %effective,
                    "Declared fee differs from inputs minus outputs"
                ),
            }
        }
        Ok(outcome)
    }

    /// The mutations that persist one propagated transaction.
    pub fn propagation_mutations(
        tx: &FlowTransaction,
        outcome: &PropagationOutcome,
    ) -> Vec<GraphMutation> {
        let mut mutations = Vec::with_capacity(
            tx.outputs.len() + tx.inputs.len() + outcome.edges.len(),
        );
        for output in &tx.outputs {
            mutations.push(GraphMutation::MergeUtxo(UtxoNode::from_output(
                tx,
                output,
                outcome.taint_of(output.output_index),
            )));
        }
        for input in &tx.inputs {
            mutations.push(GraphMutation::mark_spent(input.outpoint(), tx.tx_id.clone()));
        }
        mutations.extend(outcome.edges.iter().cloned().map(GraphMutation::MergeSpendEdge));
        mutations
    }

    async fn write(&self, tx_id: &str, mutations: Vec<GraphMutation>) -> TaintResult<()> {
        self.store.write_batch(mutations).await.map_err(|err| {
            let err = TaintError::from(err);
            if err.is_invariant_violation() {
                error!(tx_id, error = %err, "Graph store rejected taint batch");
            }
            err
        })
    }
}

#[async_trait]
impl<S: GraphStore> TaintApi for TaintPropagationService<S> {
    async fn propagate_transaction(&self, tx: &FlowTransaction) -> TaintResult<PropagationOutcome> {
        let inputs = self.load_inputs(tx).await?;
        let outcome = self.propagate_loaded(tx, &inputs)?;
        let mutations = Self::propagation_mutations(tx, &outcome);
        self.write(tx.tx_id.as_str(), mutations).await?;
        debug!(
            tx_id = %tx.tx_id,
            edges = outcome.edges.len(),
            fee_taint = outcome.fee_taint,
            "Propagated taint"
        );
        Ok(outcome)
    }

    async fn seed_utxo_taint(&self, utxo_id: &UtxoId, score: f64) -> TaintResult<bool> {
        if !(0.0..=1.0).contains(&score) {
            return Err(TaintError::InvalidTaintScore(score));
        }
        if self.store.get_utxo(utxo_id).await?.is_none() {
            return Ok(false);
        }
        self.write(
            utxo_id.tx_id.as_str(),
            vec![GraphMutation::SetTaint {
                utxo_id: utxo_id.clone(),
                taint_score: score,
            }],
        )
        .await?;
        debug!(utxo_id = %utxo_id, score, "Seeded output taint");
        Ok(true)
    }

    async fn seed_address_taint(&self, address: &Address, score: f64) -> TaintResult<usize> {
        if !(0.0..=1.0).contains(&score) {
            return Err(TaintError::InvalidTaintScore(score));
        }
        let nodes = self.store.address_utxos(address, None).await?;
        if nodes.is_empty() {
            return Ok(0);
        }
        let count = nodes.len();
        let mutations = nodes
            .into_iter()
            .map(|node| GraphMutation::SetTaint {
                utxo_id: node.utxo_id,
                taint_score: score,
            })
            .collect();
        self.write(address.as_str(), mutations).await?;
        debug!(address = %address, score, outputs = count, "Seeded address taint");
        Ok(count)
    }
}
