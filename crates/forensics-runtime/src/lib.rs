//! # Forensics Runtime
//!
//! Composition root for the forensic core.
//!
//! ## Architecture
//!
//! ```text
//! NDJSON events ──→ IngestionPipeline ──┐
//!                    (cf-01 → cf-02 →   │
//!                     cf-03 evidence)   │
//!                                       ▼
//!                 ResilientGraphStore<InMemoryGraphStore>
//!                       ▲                       ▲
//!                       │                       │
//!             ClusteringService (cf-03)   GraphQueryService (cf-04)
//! ```
//!
//! Engines never touch metrics. The container and the pipeline record
//! Prometheus counters from the outcomes and reports the engines return.
//!
//! ## Configuration
//!
//! [`ForensicsConfig::from_env`] reads `CF_*` variables over the engine
//! defaults; [`ForensicsConfig::validate`] runs before anything is built.

pub mod config;
pub mod container;
pub mod ingestion;

pub use config::{ConfigError, ForensicsConfig, IngestionConfig, StoreConfig, DEFAULT_HAIRCUT_FACTOR};
pub use container::{ForensicsContainer, ForensicsStore};
pub use ingestion::{IngestError, IngestResult, IngestionEvent, IngestionPipeline, SaveSummary};
