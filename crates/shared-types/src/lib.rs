//! # Shared Types Crate
//!
//! This crate contains the flow-graph entities and the error taxonomy shared
//! by the normalizer, the taint engine, the clustering engine and the query
//! engine.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate boundary or
//!   the graph store boundary is defined here.
//! - **Exact Value Arithmetic**: values are integer base units ([`Amount`]);
//!   floats only ever carry ratios (proportions, taint scores).
//! - **Append-Only Ledger**: nothing here models deletion. Nodes flip to
//!   spent, evidence counters only grow, clusters only merge.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
