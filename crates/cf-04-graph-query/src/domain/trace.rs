//! Traversal bookkeeping shared by every multi-hop query.
//!
//! The store is a DAG but outputs are shared freely (fan-in, fan-out), so a
//! naive walk revisits nodes exponentially. [`TraceBuilder`] admits each
//! output once, keeps one edge per `(from, to)` pair, and stops admitting
//! at the node cap.

use serde::{Deserialize, Serialize};
use shared_types::{SpendEdge, UtxoId, UtxoNode};
use std::collections::{BTreeMap, HashSet};

/// Which way a trace follows spend edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceDirection {
    /// From consumed outputs to the outputs they funded.
    Forward,
    /// From outputs back to the outputs that funded them.
    Backward,
}

impl TraceDirection {
    /// The endpoint of `edge` the walk moves to.
    pub fn far_end(self, edge: &SpendEdge) -> &UtxoId {
        match self {
            TraceDirection::Forward => &edge.to,
            TraceDirection::Backward => &edge.from,
        }
    }
}

/// Subgraph collected by a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowTrace {
    pub direction: TraceDirection,
    pub roots: Vec<UtxoId>,
    /// Every admitted output, in discovery order.
    pub nodes: Vec<UtxoNode>,
    /// Edges between admitted outputs, ordered by `(from, to)`.
    pub edges: Vec<SpendEdge>,
    /// Deepest hop that admitted at least one node.
    pub hops: usize,
    /// The node cap stopped the walk before it was exhausted.
    pub truncated: bool,
}

impl FlowTrace {
    pub fn empty(direction: TraceDirection) -> Self {
        Self {
            direction,
            roots: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            hops: 0,
            truncated: false,
        }
    }

    pub fn node(&self, utxo_id: &UtxoId) -> Option<&UtxoNode> {
        self.nodes.iter().find(|n| &n.utxo_id == utxo_id)
    }

    /// Sum of `value × taint` over the collected outputs that are still
    /// unspent.
    pub fn unspent_tainted_value(&self) -> f64 {
        self.nodes
            .iter()
            .filter(|n| !n.spent)
            .map(UtxoNode::tainted_value)
            .sum()
    }
}

/// Accumulates a [`FlowTrace`] under a node cap.
#[derive(Debug)]
pub struct TraceBuilder {
    direction: TraceDirection,
    max_nodes: usize,
    roots: Vec<UtxoId>,
    seen: HashSet<UtxoId>,
    nodes: Vec<UtxoNode>,
    edges: BTreeMap<(UtxoId, UtxoId), SpendEdge>,
    hops: usize,
    truncated: bool,
}

impl TraceBuilder {
    pub fn new(direction: TraceDirection, max_nodes: usize) -> Self {
        Self {
            direction,
            max_nodes,
            roots: Vec::new(),
            seen: HashSet::new(),
            nodes: Vec::new(),
            edges: BTreeMap::new(),
            hops: 0,
            truncated: false,
        }
    }

    pub fn direction(&self) -> TraceDirection {
        self.direction
    }

    pub fn contains(&self, utxo_id: &UtxoId) -> bool {
        self.seen.contains(utxo_id)
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Admit a root output. Returns `false` if it was already present or
    /// the cap is reached.
    pub fn admit_root(&mut self, node: UtxoNode) -> bool {
        let id = node.utxo_id.clone();
        let admitted = self.admit(node, 0);
        if admitted {
            self.roots.push(id);
        }
        admitted
    }

    /// Admit `node` discovered at `hop`. Returns `false` if it was already
    /// present or the cap is reached.
    pub fn admit(&mut self, node: UtxoNode, hop: usize) -> bool {
        if self.seen.contains(&node.utxo_id) {
            return false;
        }
        if self.nodes.len() >= self.max_nodes {
            self.truncated = true;
            return false;
        }
        self.seen.insert(node.utxo_id.clone());
        self.nodes.push(node);
        self.hops = self.hops.max(hop);
        true
    }

    /// Record `edge` if both endpoints were admitted.
    pub fn link(&mut self, edge: SpendEdge) -> bool {
        if !self.seen.contains(&edge.from) || !self.seen.contains(&edge.to) {
            return false;
        }
        self.edges.entry(edge.key()).or_insert(edge);
        true
    }

    pub fn finish(self) -> FlowTrace {
        FlowTrace {
            direction: self.direction,
            roots: self.roots,
            nodes: self.nodes,
            edges: self.edges.into_values().collect(),
            hops: self.hops,
            truncated: self.truncated,
        }
    }
}
