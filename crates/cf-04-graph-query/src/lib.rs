//! # Graph Query Engine (cf-04)
//!
//! Read-only, multi-hop questions about the flow graph: where did this
//! output's value go, where did it come from, how are two outputs connected,
//! and which addresses travel together.
//!
//! ## Operations
//!
//! | Operation | Walk | Result |
//! |-----------|------|--------|
//! | `get_utxo_history` | forward, unbounded hops | [`SpendingChain`] |
//! | `trace_utxo_flow` | forward, `max_hops` | [`FlowTrace`] |
//! | `trace_utxo_sources` | backward, `max_hops` | [`FlowTrace`] |
//! | `trace_address_flow` | forward from every output of an address | [`FlowTrace`] |
//! | `find_flow_path` | forward BFS | shortest [`FlowPath`] |
//! | `find_clustered_addresses` | co-spend rows | neighbor addresses |
//! | `get_cluster_members` | persisted cluster | [`ClusterMembership`] |
//!
//! ## Bounds
//!
//! Every traversal:
//!
//! - admits each output once and keeps one edge per `(from, to)`;
//! - stops admitting at `max_traversal_nodes` (default 10 000) and reports
//!   `truncated`;
//! - fails with [`QueryError::TimedOut`] past `traversal_timeout_secs`;
//! - fails with [`QueryError::Cancelled`] once the service's shutdown
//!   token fires.
//!
//! Unknown outputs and addresses give empty results, never errors.

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;
pub mod types;

pub use domain::{
    ClusterMembership, FlowPath, FlowTrace, PathIndex, SpendingChain, TraceBuilder,
    TraceDirection,
};
pub use error::{QueryError, QueryResult};
pub use ports::QueryApi;
pub use service::GraphQueryService;
pub use types::{QueryConfig, DEFAULT_MAX_TRAVERSAL_NODES, DEFAULT_TRAVERSAL_TIMEOUT_SECS};
