//! Configuration for the taint propagation engine.

use crate::domain::{FeeTaintPolicy, TaintModel};
use serde::{Deserialize, Serialize};

/// Taint propagation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaintConfig {
    pub model: TaintModel,
    /// Fund change outputs from their source input before distributing the
    /// rest. Ignored by the FIFO model.
    pub exclude_change_from_distribution: bool,
    pub fee_policy: FeeTaintPolicy,
}

impl Default for TaintConfig {
    fn default() -> Self {
        Self {
            model: TaintModel::Proportional,
            exclude_change_from_distribution: false,
            fee_policy: FeeTaintPolicy::TrackSeparately,
        }
    }
}
