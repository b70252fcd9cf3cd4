//! Error types for the clustering engine.

use shared_types::GraphStoreError;
use thiserror::Error;

/// Errors raised by clustering operations.
///
/// Store failures inside a single heuristic are not errors: they are
/// collected as `HeuristicFailure`s in the run report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusteringError {
    /// A store read that the operation cannot do without failed.
    #[error(transparent)]
    Store(#[from] GraphStoreError),

    /// Writing the merged clusters failed; nothing from this run was kept.
    #[error("Failed to persist {clusters} cluster merges: {source}")]
    Persist {
        clusters: usize,
        source: GraphStoreError,
    },

    #[error("Clustering run needs at least one seed address")]
    NoSeeds,
}

/// Result type for clustering operations.
pub type ClusteringResult<T> = Result<T, ClusteringError>;
