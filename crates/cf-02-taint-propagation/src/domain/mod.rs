//! # Domain Layer
//!
//! Pure taint math. No I/O: the service feeds it a snapshot of the consumed
//! outputs and persists what it returns.

pub mod allocation;
pub mod model;
pub mod propagate;

pub use allocation::{Allocation, ChangeFunding};
pub use model::{FeeTaintPolicy, TaintModel};
pub use propagate::{propagate, PropagationOutcome, PropagationWarning, ValueSource};
