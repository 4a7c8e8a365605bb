//! Consistent hashing ring implementation.

use std::collections::{BTreeMap, HashMap};

use reef_types::{NodeId, RingSlot};
use tracing::debug;

use crate::hash::fnv1a_32;

/// Default number of virtual replicas per node.
pub const DEFAULT_REPLICAS: u32 = 100;

/// Consistent hashing ring for deterministic key placement.
///
/// Each node is mapped to `replicas` positions on a u32 ring. A key is
/// owned by the first position whose hash is `>=` the key's hash; keys past
/// the last position wrap around to the first.
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Ring positions: hash -> owning node. Always in ascending hash order.
    slots: BTreeMap<u32, NodeId>,
    /// Replica count each node was added with.
    nodes: HashMap<NodeId, u32>,
    /// Default replica count for [`HashRing::add_node`].
    replicas: u32,
}

impl HashRing {
    /// Create a new empty ring.
    ///
    /// `replicas` is the number of positions given to each node added with
    /// [`HashRing::add_node`].
    pub fn new(replicas: u32) -> Self {
        Self {
            slots: BTreeMap::new(),
            nodes: HashMap::new(),
            replicas,
        }
    }

    /// Add a node with the ring's default replica count.
    pub fn add_node(&mut self, node_id: NodeId) {
        self.add_node_with_replicas(node_id, self.replicas);
    }

    /// Add a node with an explicit replica count.
    ///
    /// Re-adding a node replaces its previous positions, so a
    /// (node, replica-index) pair never occupies two slots. If two positions
    /// hash to the same value the last one inserted owns it.
    pub fn add_node_with_replicas(&mut self, node_id: NodeId, replicas: u32) {
        self.remove_node(&node_id);

        for i in 0..replicas {
            let pos = replica_position(&node_id, i);
            if let Some(prev) = self.slots.insert(pos, node_id.clone())
                && prev != node_id
            {
                debug!(%node_id, %prev, pos, "ring position collision, last writer wins");
            }
        }

        debug!(%node_id, replicas, "added node to ring");
        self.nodes.insert(node_id, replicas);
    }

    /// Remove a node and all of its positions from the ring.
    pub fn remove_node(&mut self, node_id: &NodeId) {
        if let Some(replicas) = self.nodes.remove(node_id) {
            for i in 0..replicas {
                let pos = replica_position(node_id, i);
                // A colliding node may have taken this position over.
                if self.slots.get(&pos) == Some(node_id) {
                    self.slots.remove(&pos);
                }
            }
            debug!(%node_id, "removed node from ring");
        }
    }

    /// Return the node responsible for `key`, or `None` if the ring is empty.
    pub fn get_node(&self, key: &str) -> Option<&NodeId> {
        let hash = fnv1a_32(key.as_bytes());

        // Successor search; past the last position, wrap to the first.
        self.slots
            .range(hash..)
            .next()
            .or_else(|| self.slots.iter().next())
            .map(|(_, node_id)| node_id)
    }

    /// Number of physical nodes on the ring.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of occupied positions on the ring.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Whether the ring has no positions at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Default replica count for new nodes.
    pub fn replicas(&self) -> u32 {
        self.replicas
    }

    /// All node IDs on the ring, sorted.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Iterate over ring positions in ascending hash order.
    pub fn slots(&self) -> impl Iterator<Item = RingSlot> + '_ {
        self.slots.iter().map(|(hash, owner)| RingSlot {
            hash: *hash,
            owner: owner.clone(),
        })
    }

    /// Number of positions currently owned by each node.
    pub fn slot_counts(&self) -> BTreeMap<NodeId, usize> {
        let mut counts: BTreeMap<NodeId, usize> =
            self.nodes.keys().map(|id| (id.clone(), 0)).collect();
        for owner in self.slots.values() {
            *counts.entry(owner.clone()).or_default() += 1;
        }
        counts
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}

/// Position of a node's `i`-th replica: `fnv1a_32("<node>:<i>")`.
fn replica_position(node_id: &NodeId, i: u32) -> u32 {
    fnv1a_32(format!("{node_id}:{i}").as_bytes())
}
