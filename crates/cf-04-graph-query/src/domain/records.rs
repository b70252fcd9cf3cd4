//! Query result records.

use super::trace::FlowTrace;
use serde::{Deserialize, Serialize};
use shared_types::{Address, ClusterId, SpendEdge, UtxoId, UtxoNode};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Where the value of one output went, down to the outputs still unspent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendingChain {
    pub origin: UtxoNode,
    /// Every spend edge reached, ordered by `(from, to)`.
    pub spends: Vec<SpendEdge>,
    /// Unspent outputs the value currently sits in.
    pub terminals: Vec<UtxoNode>,
    pub truncated: bool,
}

impl SpendingChain {
    /// Build the chain from a forward trace rooted at one output.
    pub fn from_trace(trace: FlowTrace) -> Option<Self> {
        let mut nodes = trace.nodes.into_iter();
        let origin = nodes.next()?;
        let mut terminals: Vec<UtxoNode> = nodes.filter(|n| !n.spent).collect();
        if !origin.spent {
            terminals.insert(0, origin.clone());
        }
        Some(Self {
            origin,
            spends: trace.edges,
            terminals,
            truncated: trace.truncated,
        })
    }
}

/// One route value took between two outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPath {
    /// Outputs along the path, source first.
    pub nodes: Vec<UtxoNode>,
    /// `edges[i]` joins `nodes[i]` to `nodes[i + 1]`.
    pub edges: Vec<SpendEdge>,
}

impl FlowPath {
    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    /// Fraction of the source's value that reaches the destination along
    /// this route.
    pub fn carried_proportion(&self) -> f64 {
        self.edges.iter().map(|e| e.proportion).product()
    }
}

/// BFS parent links for rebuilding the shortest route.
#[derive(Debug, Default)]
pub struct PathIndex {
    parents: HashMap<UtxoId, SpendEdge>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record how `edge.to` was first reached. Later routes are ignored.
    pub fn reach(&mut self, edge: SpendEdge) {
        self.parents.entry(edge.to.clone()).or_insert(edge);
    }

    /// Edges from the source to `target`, source first.
    pub fn route_to(&self, target: &UtxoId) -> Vec<SpendEdge> {
        let mut route = VecDeque::new();
        let mut current = target;
        while let Some(edge) = self.parents.get(current) {
            route.push_front(edge.clone());
            current = &edge.from;
        }
        route.into()
    }
}

/// Persisted cluster an address belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMembership {
    pub cluster_id: ClusterId,
    pub members: BTreeSet<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trace::{TraceBuilder, TraceDirection};
    use shared_types::{Amount, TxId};

    fn node(tx: &str, spent: bool) -> UtxoNode {
        UtxoNode {
            utxo_id: UtxoId::new(tx, 0),
            value: Amount::from_base_units(10),
            owning_addresses: BTreeSet::new(),
            is_change: false,
            is_coinjoin: false,
            spent,
            taint_score: 0.0,
            block_height: None,
            timestamp: None,
        }
    }

    fn edge(from: &str, to: &str, proportion: f64) -> SpendEdge {
        SpendEdge {
            from: UtxoId::new(from, 0),
            to: UtxoId::new(to, 0),
            tx_hash: TxId::from(to),
            proportion,
            taint_contribution: 0.0,
        }
    }

    #[test]
    fn test_chain_terminals_are_unspent_outputs() {
        let mut builder = TraceBuilder::new(TraceDirection::Forward, 10);
        builder.admit_root(node("a", true));
        builder.admit(node("b", true), 1);
        builder.admit(node("c", false), 2);
        builder.link(edge("a", "b", 1.0));
        builder.link(edge("b", "c", 1.0));

        let chain = SpendingChain::from_trace(builder.finish()).unwrap();
        assert_eq!(chain.spends.len(), 2);
        assert_eq!(chain.terminals.len(), 1);
        assert_eq!(chain.terminals[0].utxo_id, UtxoId::new("c", 0));
    }

    #[test]
    fn test_unspent_origin_is_its_own_terminal() {
        let mut builder = TraceBuilder::new(TraceDirection::Forward, 10);
        builder.admit_root(node("a", false));
        let chain = SpendingChain::from_trace(builder.finish()).unwrap();
        assert_eq!(chain.terminals, vec![node("a", false)]);
    }

    #[test]
    fn test_route_reconstruction_keeps_first_parent() {
        let mut index = PathIndex::new();
        index.reach(edge("a", "b", 0.5));
        index.reach(edge("a", "c", 0.5));
        index.reach(edge("b", "d", 0.4));
        index.reach(edge("c", "d", 1.0));

        let route = index.route_to(&UtxoId::new("d", 0));
        assert_eq!(route.len(), 2);
        assert_eq!(route[0].to, UtxoId::new("b", 0));

        let path = FlowPath {
            nodes: vec![node("a", true), node("b", true), node("d", false)],
            edges: route,
        };
        assert_eq!(path.hops(), 2);
        assert!((path.carried_proportion() - 0.2).abs() < 1e-12);
    }
}
