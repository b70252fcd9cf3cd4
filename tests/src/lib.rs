//! # Chain-Forensics Test Suite
//!
//! Cross-crate scenarios that drive raw transactions through the ingestion
//! pipeline and check what the engines derive from the resulting graph.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Raw transaction builders, container setup
//! └── integration/
//!     ├── taint_scenarios.rs       # Proportional, mixing, change, haircut
//!     ├── clustering_scenarios.rs  # Mixer filtering, change merges, coinjoin
//!     ├── query_scenarios.rs       # Multi-hop tracing after ingestion
//!     ├── resilience.rs            # Transient store faults
//!     └── conservation.rs          # Randomized taint conservation
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p cf-tests
//! cargo test -p cf-tests integration::conservation
//! cargo bench -p cf-tests
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
