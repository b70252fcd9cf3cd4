//! # Domain Layer
//!
//! Union-find, the individual heuristics and the records they produce.
//! Everything here is synchronous and store-free.

pub mod change;
pub mod confidence;
pub mod evidence;
pub mod peeling;
pub mod report;
pub mod temporal;
pub mod union_find;

pub use change::{detect_change, is_round_value, ChangeDetection, ChangeSignal, ScriptKind};
pub use evidence::{transaction_evidence, TransactionEvidence};
pub use peeling::{peel_of, Peel, PeelEntityType};
pub use report::*;
pub use temporal::sync_count;
pub use union_find::UnionFind;
