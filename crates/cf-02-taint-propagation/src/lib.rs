//! # Taint Propagation Engine (cf-02)
//!
//! Computes how taint spreads from consumed outputs to the outputs a
//! transaction creates, and records the flow as spend edges.
//!
//! ## Models
//!
//! | Model | Output taint | Fee |
//! |-------|--------------|-----|
//! | `Proportional` (default) | value-weighted mix of input taints | consumed pro rata from all inputs |
//! | `Fifo` | inputs fill outputs in declaration order | value left after the last output |
//! | `Haircut { factor }` | proportional × `factor` per hop | as proportional, × `factor` |
//!
//! All three reduce to one allocation matrix (`flows[i][j]`, `fee[i]`), from
//! which proportions, contributions, output taints and the fee's tainted
//! value are derived the same way.
//!
//! ## Data Flow
//!
//! ```text
//! FlowTransaction ──→ [load_inputs: one snapshot read] ──→ [propagate]
//!                                                              │
//!                      GraphStore ←── one atomic batch ←───────┘
//!                      (outputs, spent flags, spend edges)
//! ```
//!
//! ## Guarantees
//!
//! - Taint scores always lie in `[0, 1]`.
//! - With `TrackSeparately` and no change exclusion, tainted value is
//!   conserved: `Σ out.taint·out.value = Σ in.taint·in.value − fee_taint`.
//! - Outputs spent twice by different transactions are rejected by the
//!   store before anything is written.
//! - Inputs missing from the graph count as untainted and produce a
//!   [`PropagationWarning::MissingInput`].

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;
pub mod types;

pub use domain::{
    propagate, Allocation, ChangeFunding, FeeTaintPolicy, PropagationOutcome,
    PropagationWarning, TaintModel, ValueSource,
};
pub use error::{TaintError, TaintResult};
pub use ports::TaintApi;
pub use service::TaintPropagationService;
pub use types::TaintConfig;
