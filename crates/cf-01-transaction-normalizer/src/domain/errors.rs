//! # Domain Errors

use shared_types::AmountParseError;
use thiserror::Error;

/// Errors produced while normalizing a raw transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The record cannot describe a valid flow of value. Nothing about the
    /// transaction may be persisted.
    #[error("Malformed transaction {tx_id:?}: {reason}")]
    MalformedTransaction {
        tx_id: String,
        reason: MalformedReason,
    },
}

impl NormalizeError {
    pub fn malformed(tx_id: impl Into<String>, reason: MalformedReason) -> Self {
        Self::MalformedTransaction {
            tx_id: tx_id.into(),
            reason,
        }
    }
}

/// Why a raw transaction was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("transaction id is empty")]
    EmptyTxId,

    #[error("transaction has no inputs")]
    NoInputs,

    #[error("transaction has no outputs")]
    NoOutputs,

    #[error("output {output_index} has an invalid value: {source}")]
    InvalidValue {
        output_index: u32,
        source: AmountParseError,
    },

    #[error("input {input_index} prevout has an invalid value: {source}")]
    InvalidPrevoutValue {
        input_index: usize,
        source: AmountParseError,
    },

    #[error("invalid fee: {0}")]
    InvalidFee(AmountParseError),

    #[error("output index {0} appears more than once")]
    DuplicateOutputIndex(u32),

    #[error("coinbase input mixed with spending inputs")]
    MixedCoinbase,

    #[error("outpoint {0} is consumed more than once")]
    DuplicateOutpoint(String),

    #[error("input {0} has an empty previous transaction id")]
    EmptyPrevTxId(usize),
}

/// Result type for normalization.
pub type NormalizeResult<T> = Result<T, NormalizeError>;
