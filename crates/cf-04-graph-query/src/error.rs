//! Error types for the query engine.

use shared_types::GraphStoreError;
use thiserror::Error;

/// Errors raised by graph queries.
///
/// Unknown outputs, addresses and clusters are not errors; they produce
/// empty results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] GraphStoreError),

    /// The service's shutdown token fired while the query was running.
    #[error("Query {operation} cancelled")]
    Cancelled { operation: &'static str },

    #[error("Query {operation} exceeded {timeout_ms} ms")]
    TimedOut {
        operation: &'static str,
        timeout_ms: u64,
    },
}

/// Result type for graph queries.
pub type QueryResult<T> = Result<T, QueryError>;
