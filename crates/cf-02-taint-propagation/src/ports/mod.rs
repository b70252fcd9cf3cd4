//! Ports for the taint propagation engine.
//!
//! The outbound side is the shared [`GraphStore`](shared_graph_store::GraphStore).

pub mod inbound;

pub use inbound::TaintApi;
