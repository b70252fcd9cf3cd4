//! # Transaction Normalizer (cf-01)
//!
//! Converts raw chain-adapter records into [`FlowTransaction`]s, the only
//! transaction shape the rest of the core understands.
//!
//! ## Pipeline Position
//!
//! ```text
//! chain adapter ──raw JSON──→ [Normalizer] ──FlowTransaction──→ Taint Engine (cf-02)
//! ```
//!
//! ## Rejection Rules
//!
//! | Condition | Reason |
//! |-----------|--------|
//! | empty `txid` | `EmptyTxId` |
//! | no `vin` / no `vout` | `NoInputs` / `NoOutputs` |
//! | negative, non-numeric or over-precise value | `InvalidValue` |
//! | repeated `vout[].n` | `DuplicateOutputIndex` |
//! | coinbase input next to spending inputs | `MixedCoinbase` |
//! | same outpoint consumed twice | `DuplicateOutpoint` |
//!
//! Normalization is pure: a rejected transaction has no side effects.
//!
//! [`FlowTransaction`]: shared_types::FlowTransaction

pub mod domain;

pub use domain::{
    detect_coinjoin, equal_output_count, normalize, MalformedReason, NormalizeError,
    NormalizeResult, RawAmount, RawBlock, RawInput, RawOutput, RawPrevout, RawScriptPubKey,
    RawTransaction,
};
