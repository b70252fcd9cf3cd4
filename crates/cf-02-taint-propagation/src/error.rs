//! Error types for the taint propagation engine.

use shared_types::GraphStoreError;
use thiserror::Error;

/// Errors raised while propagating or seeding taint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaintError {
    /// The graph store failed or rejected the batch.
    #[error(transparent)]
    Store(#[from] GraphStoreError),

    /// The transaction's resolved values cannot describe a valid flow.
    #[error("Invariant violation in transaction {tx_id}: {detail}")]
    InvariantViolation { tx_id: String, detail: String },

    /// Model parameters out of range (e.g. haircut factor ≥ 1).
    #[error("Invalid taint model: {0}")]
    InvalidModel(String),

    /// Seed scores must lie in `[0, 1]`.
    #[error("Invalid taint score {0}: must be within [0, 1]")]
    InvalidTaintScore(f64),
}

impl TaintError {
    /// Whether this error (or the store error it wraps) is an invariant
    /// violation. These are logged at error level and never swallowed.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            TaintError::InvariantViolation { .. }
                | TaintError::Store(GraphStoreError::InvariantViolation { .. })
        )
    }
}

/// Result type for taint operations.
pub type TaintResult<T> = Result<T, TaintError>;
