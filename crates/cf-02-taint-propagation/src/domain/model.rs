//! Taint models and fee policy.

use crate::error::{TaintError, TaintResult};
use serde::{Deserialize, Serialize};

/// How input taint is attributed to outputs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum TaintModel {
    /// Value-weighted mix of every input's taint.
    #[default]
    Proportional,
    /// Inputs fill outputs in declaration order.
    Fifo,
    /// Proportional, then multiplied by `factor` on every hop.
    Haircut { factor: f64 },
}

impl TaintModel {
    /// Resolve a model by name (`proportional`, `fifo`, `haircut`).
    pub fn from_name(name: &str, haircut_factor: f64) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "proportional" => Some(TaintModel::Proportional),
            "fifo" => Some(TaintModel::Fifo),
            "haircut" => Some(TaintModel::Haircut {
                factor: haircut_factor,
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TaintModel::Proportional => "proportional",
            TaintModel::Fifo => "fifo",
            TaintModel::Haircut { .. } => "haircut",
        }
    }

    /// Haircut factor must lie in `[0, 1)`.
    pub fn validate(&self) -> TaintResult<()> {
        if let TaintModel::Haircut { factor } = self {
            if !(0.0..1.0).contains(factor) {
                return Err(TaintError::InvalidModel(format!(
                    "haircut factor {factor} outside [0, 1)"
                )));
            }
        }
        Ok(())
    }

    /// Per-hop multiplier applied to every derived taint value.
    pub fn hop_multiplier(&self) -> f64 {
        match self {
            TaintModel::Haircut { factor } => *factor,
            _ => 1.0,
        }
    }

    /// Whether change outputs may be funded ahead of payments.
    pub fn supports_change_exclusion(&self) -> bool {
        !matches!(self, TaintModel::Fifo)
    }
}

/// What happens to the tainted part of the fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeTaintPolicy {
    /// Report the fee's tainted value as `fee_taint`; outputs exclude it.
    #[default]
    TrackSeparately,
    /// Spread each input's fee share over the outputs, pro rata to value.
    FoldIntoOutputs,
}

impl FeeTaintPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "track_separately" | "separate" => Some(FeeTaintPolicy::TrackSeparately),
            "fold_into_outputs" | "fold" => Some(FeeTaintPolicy::FoldIntoOutputs),
            _ => None,
        }
    }
}
