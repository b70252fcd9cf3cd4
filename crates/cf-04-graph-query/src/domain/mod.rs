//! # Domain Layer
//!
//! Traversal bookkeeping and result records; no store access.

pub mod records;
pub mod trace;

pub use records::{ClusterMembership, FlowPath, PathIndex, SpendingChain};
pub use trace::{FlowTrace, TraceBuilder, TraceDirection};
