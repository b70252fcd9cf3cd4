//! Driving port (API - Inbound).

use crate::domain::PropagationOutcome;
use crate::error::TaintResult;
use async_trait::async_trait;
use shared_types::{Address, FlowTransaction, UtxoId};

/// Primary taint API.
#[async_trait]
pub trait TaintApi: Send + Sync {
    /// Load the inputs of `tx`, propagate, and persist the outputs, spend
    /// edges and spent flags as one atomic batch.
    async fn propagate_transaction(&self, tx: &FlowTransaction) -> TaintResult<PropagationOutcome>;

    /// Set the source taint of one stored output. Returns `false` when the
    /// output is unknown.
    async fn seed_utxo_taint(&self, utxo_id: &UtxoId, score: f64) -> TaintResult<bool>;

    /// Set the source taint of every stored output of `address`. Returns the
    /// number of outputs updated.
    async fn seed_address_taint(&self, address: &Address, score: f64) -> TaintResult<usize>;
}
