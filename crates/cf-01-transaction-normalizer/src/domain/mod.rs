//! # Domain Layer
//!
//! Raw record shapes, the normalization rules and coinjoin detection.
//! No I/O.

pub mod coinjoin;
pub mod errors;
pub mod normalize;
pub mod raw;

pub use coinjoin::*;
pub use errors::*;
pub use normalize::*;
pub use raw::*;
