//! Result records returned by the clustering service.

use super::peeling::PeelEntityType;
use serde::{Deserialize, Serialize};
use shared_types::{Address, Amount, ClusterId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Clustering heuristic identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    ExistingCluster,
    CoSpend,
    ChangeAddress,
    Temporal,
    PeelingChain,
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Heuristic::ExistingCluster => "existing_cluster",
            Heuristic::CoSpend => "co_spend",
            Heuristic::ChangeAddress => "change_address",
            Heuristic::Temporal => "temporal",
            Heuristic::PeelingChain => "peeling_chain",
        };
        f.write_str(name)
    }
}

/// A heuristic that could not run for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicFailure {
    pub heuristic: Heuristic,
    pub address: Address,
    pub error: String,
}

/// One observation made during a clustering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusterEvidence {
    ExistingCluster {
        address: Address,
        cluster_id: ClusterId,
    },
    /// `merged` is false when the pair exceeded the mixer threshold.
    CoSpend {
        address: Address,
        neighbor: Address,
        tx_count: u64,
        merged: bool,
    },
    ChangeLink {
        input_address: Address,
        change_address: Address,
        change_count: u64,
        merged: bool,
    },
    Temporal {
        address: Address,
        candidate: Address,
        sync_count: u64,
        merged: bool,
    },
}

impl ClusterEvidence {
    pub fn merged(&self) -> bool {
        match self {
            ClusterEvidence::ExistingCluster { .. } => true,
            ClusterEvidence::CoSpend { merged, .. }
            | ClusterEvidence::ChangeLink { merged, .. }
            | ClusterEvidence::Temporal { merged, .. } => *merged,
        }
    }
}

/// Outcome of `cluster_addresses`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusteringReport {
    /// Multi-address clusters among the touched addresses.
    pub clusters: BTreeMap<ClusterId, BTreeSet<Address>>,
    /// Touched addresses that ended up alone.
    pub unclustered: BTreeSet<Address>,
    pub evidence: Vec<ClusterEvidence>,
    pub failures: Vec<HeuristicFailure>,
    /// Unions that joined two previously separate sets.
    pub merges: usize,
    /// Expansion stopped at the per-run address cap.
    pub truncated: bool,
}

impl ClusteringReport {
    pub fn cluster_of(&self, address: &Address) -> Option<&ClusterId> {
        self.clusters
            .iter()
            .find(|(_, members)| members.contains(address))
            .map(|(id, _)| id)
    }
}

/// One piece of evidence behind an ownership assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OwnershipEvidence {
    SameCluster {
        cluster_id: ClusterId,
    },
    CoSpend {
        tx_count: u64,
        probability: f64,
        excluded_as_mixer: bool,
    },
    ChangeLink {
        change_count: u64,
        probability: f64,
    },
    Temporal {
        sync_count: u64,
        probability: f64,
    },
}

/// Outcome of `find_common_ownership`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipAssessment {
    pub address_a: Address,
    pub address_b: Address,
    pub likely_same_owner: bool,
    pub confidence: f64,
    pub evidence: Vec<OwnershipEvidence>,
}

/// Outcome of `detect_peeling_chain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeelingChainReport {
    pub address: Address,
    pub is_peeling_chain: bool,
    pub peel_count: u64,
    pub avg_change_ratio: f64,
    pub likely_entity_type: PeelEntityType,
    /// Addresses the walk passed through, in visiting order.
    pub visited: Vec<Address>,
}

/// Size band of a persisted cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterEntityType {
    SmallCluster,
    MediumEntity,
    LargeEntityOrExchange,
}

impl ClusterEntityType {
    pub fn from_size(size: usize) -> Self {
        if size >= 100 {
            ClusterEntityType::LargeEntityOrExchange
        } else if size >= 10 {
            ClusterEntityType::MediumEntity
        } else {
            ClusterEntityType::SmallCluster
        }
    }
}

/// Outcome of `calculate_cluster_stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub cluster_id: ClusterId,
    pub size: usize,
    /// Sum of the members' unspent outputs.
    pub total_balance: Amount,
    pub total_utxos: usize,
    pub entity_type: ClusterEntityType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bands() {
        assert_eq!(ClusterEntityType::from_size(1), ClusterEntityType::SmallCluster);
        assert_eq!(ClusterEntityType::from_size(10), ClusterEntityType::MediumEntity);
        assert_eq!(ClusterEntityType::from_size(99), ClusterEntityType::MediumEntity);
        assert_eq!(
            ClusterEntityType::from_size(100),
            ClusterEntityType::LargeEntityOrExchange
        );
    }

    #[test]
    fn test_evidence_serializes_with_kind_tag() {
        let evidence = ClusterEvidence::CoSpend {
            address: Address::from("1A"),
            neighbor: Address::from("1B"),
            tx_count: 80,
            merged: false,
        };
        let json = serde_json::to_value(&evidence).unwrap();
        assert_eq!(json["kind"], "co_spend");
        assert_eq!(json["merged"], false);
        assert!(!evidence.merged());
    }
}
