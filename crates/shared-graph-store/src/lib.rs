//! # Shared Graph Store
//!
//! The persistence boundary of the forensic core. Engines never see a
//! database; they hold an `Arc<S>` where `S: GraphStore` and talk in terms of
//! flow-graph entities.
//!
//! ## Layering
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │ Taint Engine │  │  Clustering  │  │ Graph Query  │
//! └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
//!        └─────────────────┼─────────────────┘
//!                          ▼
//!              ┌───────────────────────┐
//!              │ ResilientGraphStore   │  timeout + retry/backoff
//!              └───────────┬───────────┘
//!                          ▼
//!              ┌───────────────────────┐
//!              │ GraphStore adapter    │  InMemoryGraphStore / database
//!              └───────────────────────┘
//! ```
//!
//! ## Write Model
//!
//! All writes go through [`GraphStore::write_batch`]. A batch is validated
//! as a whole (spend proportions, double spends) before anything is applied,
//! so a rejected batch leaves the store untouched.
//!
//! | Mutation | Semantics |
//! |----------|-----------|
//! | `MergeUtxo` | Upsert; never clears `spent` |
//! | `MarkSpent` | Flags the node spent by one transaction |
//! | `MergeSpendEdge` | Upsert keyed by `(from, to)` |
//! | `MergeCoSpend` | Symmetric; counts each tx id once |
//! | `MergeChangeLink` | Directed; counts each tx id once |
//! | `MergeCluster` | Union with every cluster a member already belongs to |

pub mod memory;
pub mod ports;
pub mod resilient;

pub use memory::InMemoryGraphStore;
pub use ports::{GraphMutation, GraphStore};
pub use resilient::{ResilientGraphStore, RetryPolicy};

/// Default per-call timeout applied by [`ResilientGraphStore`].
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts for transient store failures.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
