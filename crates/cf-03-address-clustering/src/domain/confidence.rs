//! Common-ownership scoring.
//!
//! Each heuristic yields an independent probability `p`; they combine as
//! `1 − Π(1 − p)`. A shared persisted cluster short-circuits to
//! [`SAME_CLUSTER_CONFIDENCE`]; anything short of that is capped at
//! [`MAX_EVIDENCE_CONFIDENCE`] so heuristic evidence never outranks it.

/// Confidence when both addresses already sit in one persisted cluster.
pub const SAME_CLUSTER_CONFIDENCE: f64 = 0.95;

/// Ceiling for combined heuristic evidence.
pub const MAX_EVIDENCE_CONFIDENCE: f64 = 0.89;

/// Threshold for reporting the pair as likely co-owned.
pub const LIKELY_SAME_OWNER_THRESHOLD: f64 = 0.5;

pub const MAX_CO_SPEND_PROBABILITY: f64 = 0.85;
pub const CHANGE_LINK_PROBABILITY: f64 = 0.4;
pub const REPEATED_CHANGE_PROBABILITY: f64 = 0.8;
pub const MAX_TEMPORAL_PROBABILITY: f64 = 0.6;

/// `1 − 0.5^n`, capped. `None` above the mixer threshold.
pub fn co_spend_probability(tx_count: u64, mixer_threshold: u64) -> Option<f64> {
    if tx_count > mixer_threshold {
        return None;
    }
    let exponent = i32::try_from(tx_count).unwrap_or(i32::MAX);
    Some((1.0 - 0.5f64.powi(exponent)).min(MAX_CO_SPEND_PROBABILITY))
}

/// 0.4 for one observed change link, 0.8 from two on.
pub fn change_link_probability(change_count: u64) -> f64 {
    match change_count {
        0 => 0.0,
        1 => CHANGE_LINK_PROBABILITY,
        _ => REPEATED_CHANGE_PROBABILITY,
    }
}

/// `0.6 · sync / threshold`, capped at 0.6.
pub fn temporal_probability(sync_count: u64, sync_threshold: u64) -> f64 {
    if sync_threshold == 0 {
        return if sync_count > 0 {
            MAX_TEMPORAL_PROBABILITY
        } else {
            0.0
        };
    }
    (MAX_TEMPORAL_PROBABILITY * sync_count as f64 / sync_threshold as f64)
        .min(MAX_TEMPORAL_PROBABILITY)
}

/// Combine independent probabilities, capped at [`MAX_EVIDENCE_CONFIDENCE`].
pub fn combine<I: IntoIterator<Item = f64>>(probabilities: I) -> f64 {
    let miss: f64 = probabilities
        .into_iter()
        .map(|p| 1.0 - p.clamp(0.0, 1.0))
        .product();
    (1.0 - miss).min(MAX_EVIDENCE_CONFIDENCE)
}
