//! # Error Types
//!
//! Defines error types used across the analysis engines.

use thiserror::Error;

/// Errors surfaced by a graph store adapter.
///
/// `Unavailable` and `Timeout` are transient and may be retried by the
/// caller. `InvariantViolation` means the batch was rejected before any
/// mutation was applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphStoreError {
    /// The backing database could not be reached or refused the request.
    #[error("Graph store unavailable during {operation}: {reason}")]
    Unavailable { operation: String, reason: String },

    /// The operation exceeded the configured query timeout.
    #[error("Graph store operation {operation} timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// A batch would break a ledger invariant (e.g. spend proportions > 1).
    #[error("Invariant violation on {utxo_id}: {detail}")]
    InvariantViolation { utxo_id: String, detail: String },

    /// Every retry attempt failed with a transient error.
    #[error("Graph store gave up on {operation} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },
}

impl GraphStoreError {
    /// Shorthand for an `Unavailable` error.
    pub fn unavailable(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Whether a retry could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Result type for graph store operations.
pub type StoreResult<T> = Result<T, GraphStoreError>;

/// Errors produced when parsing a decimal coin amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("Invalid amount: {0:?}")]
    Invalid(String),

    #[error("Negative amount: {0}")]
    Negative(String),

    #[error("Amount {0} has more than 8 fractional digits")]
    TooPrecise(String),

    #[error("Amount {0} does not fit in 64-bit base units")]
    Overflow(String),
}

/// Error produced when parsing a `tx_id:output_index` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid UTXO identifier: {0:?}")]
pub struct UtxoIdParseError(pub String);
