//! Arena-backed union-find over addresses.
//!
//! Addresses get dense integer ids on first sight; `parent`/`size` are plain
//! vectors indexed by id. Path compression on `find`, union by size.

use shared_types::Address;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Default, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    ids: HashMap<Address, usize>,
    addresses: Vec<Address>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dense id of `address`, registering it as a singleton if new.
    pub fn insert(&mut self, address: &Address) -> usize {
        if let Some(&id) = self.ids.get(address) {
            return id;
        }
        let id = self.parent.len();
        self.parent.push(id);
        self.size.push(1);
        self.ids.insert(address.clone(), id);
        self.addresses.push(address.clone());
        id
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.ids.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    fn find(&mut self, id: usize) -> usize {
        let mut root = id;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = id;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merge the sets of `a` and `b`. Returns `true` if they were separate.
    pub fn union(&mut self, a: &Address, b: &Address) -> bool {
        let (a, b) = (self.insert(a), self.insert(b));
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        true
    }

    pub fn connected(&mut self, a: &Address, b: &Address) -> bool {
        match (self.ids.get(a).copied(), self.ids.get(b).copied()) {
            (Some(a), Some(b)) => self.find(a) == self.find(b),
            _ => a == b,
        }
    }

    /// All sets, each ordered, listed by smallest member.
    pub fn groups(&mut self) -> Vec<BTreeSet<Address>> {
        let mut by_root: BTreeMap<usize, BTreeSet<Address>> = BTreeMap::new();
        for id in 0..self.parent.len() {
            let root = self.find(id);
            by_root
                .entry(root)
                .or_default()
                .insert(self.addresses[id].clone());
        }
        let mut groups: Vec<BTreeSet<Address>> = by_root.into_values().collect();
        groups.sort_by(|a, b| a.first().cmp(&b.first()));
        groups
    }
}
