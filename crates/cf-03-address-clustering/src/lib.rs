//! # Address Clustering Engine (cf-03)
//!
//! Groups addresses that are likely controlled by the same owner.
//!
//! ## Heuristics
//!
//! | Heuristic | Evidence | Merge rule |
//! |-----------|----------|------------|
//! | Existing cluster | persisted membership | always |
//! | Multi-input co-spend | `CoSpendEdge.tx_count` | `tx_count ≤ mixer_threshold` |
//! | Change address | `ChangeLink.change_count` | `change_count ≥ 2` |
//! | Temporal correlation | activity within `temporal_window_secs` | `sync_count ≥ 10` |
//! | Peeling chain | two-output spends returning most value as change | never (classification only) |
//!
//! ## Run Model
//!
//! ```text
//! seeds ──→ BFS (depth, address cap) ──→ per address:
//!             existing cluster │ co-spend │ change links │ temporal
//!                      │             │            │            │
//!                      └──────── union-find (run-local) ───────┘
//!                                        │
//!                 GraphStore ←── MergeCluster batch (monotonic)
//! ```
//!
//! A store error inside one heuristic for one address is recorded as a
//! [`HeuristicFailure`] and the run continues. Only the final persist can
//! fail a run. Runs are serialized per service so concurrent callers never
//! interleave their read-merge-persist phases.
//!
//! Ingestion-time evidence (co-spend pairs, change links, activity rows and
//! transaction records) is produced by [`transaction_evidence`], which the
//! ingestion pipeline writes in the same batch as the taint results.

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;
pub mod types;

pub use domain::{
    detect_change, is_round_value, peel_of, sync_count, transaction_evidence, ChangeDetection,
    ChangeSignal, ClusterEntityType, ClusterEvidence, ClusterStats, ClusteringReport, Heuristic,
    HeuristicFailure, OwnershipAssessment, OwnershipEvidence, Peel, PeelEntityType,
    PeelingChainReport, ScriptKind, TransactionEvidence, UnionFind,
};
pub use error::{ClusteringError, ClusteringResult};
pub use ports::ClusteringApi;
pub use service::ClusteringService;
pub use types::ClusteringConfig;
