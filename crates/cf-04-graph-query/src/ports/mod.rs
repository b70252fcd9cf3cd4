//! Ports for the query engine.
//!
//! The outbound side is the shared [`GraphStore`](shared_graph_store::GraphStore).

pub mod inbound;

pub use inbound::QueryApi;
