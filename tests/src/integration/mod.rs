//! Cross-crate integration scenarios.

pub mod clustering_scenarios;
pub mod conservation;
pub mod query_scenarios;
pub mod resilience;
pub mod taint_scenarios;
