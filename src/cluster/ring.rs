//! Consistent hash ring with virtual nodes
//!
//! [`HashRing`] is a plain value: positions on the ring map to the node
//! that owns them, and a key belongs to the first position at or after its
//! own hash, wrapping past the end. [`SharedRing`] publishes immutable
//! snapshots of it so request handlers never see a half-applied change.

use crate::cluster::node::Node;
use crate::common::hash::{HashAlgorithm, RingPosition};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, RwLock};

/// Default number of virtual nodes per physical node
pub const DEFAULT_REPLICAS: usize = 10;

/// Ring of virtual node positions
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Ordered positions; the map's key order is the ring order
    entries: BTreeMap<RingPosition, Node>,
    replicas: usize,
    algorithm: HashAlgorithm,
}

impl HashRing {
    pub fn new(replicas: usize, algorithm: HashAlgorithm) -> Self {
        Self {
            entries: BTreeMap::new(),
            replicas,
            algorithm,
        }
    }

    /// Build a ring holding every node in `nodes`
    pub fn with_nodes<'a>(
        replicas: usize,
        algorithm: HashAlgorithm,
        nodes: impl IntoIterator<Item = &'a Node>,
    ) -> Self {
        let mut ring = Self::new(replicas, algorithm);
        for node in nodes {
            ring.add_node(node);
        }
        ring
    }

    fn vnode_position(&self, node: &Node, replica: usize) -> RingPosition {
        self.algorithm.position(&format!("{}:{}", node.id, replica))
    }

    /// Insert the node's virtual positions
    ///
    /// Re-adding a node overwrites its positions with identical ones, so
    /// it is idempotent. A position colliding with another node's goes to
    /// whichever was inserted last.
    pub fn add_node(&mut self, node: &Node) {
        for replica in 0..self.replicas {
            let pos = self.vnode_position(node, replica);
            self.entries.insert(pos, node.clone());
        }
        tracing::debug!(node = %node, replicas = self.replicas, "added node to ring");
    }

    /// Remove the positions inserted for this node id
    ///
    /// A position that a collision handed to another node is left alone.
    pub fn remove_node(&mut self, node: &Node) {
        for replica in 0..self.replicas {
            let pos = self.vnode_position(node, replica);
            if self.entries.get(&pos).is_some_and(|owner| owner.id == node.id) {
                self.entries.remove(&pos);
            }
        }
        tracing::debug!(node = %node, "removed node from ring");
    }

    /// Owner of `key`: the first position >= hash(key), wrapping to the start
    pub fn locate(&self, key: &str) -> Option<&Node> {
        let pos = self.algorithm.position(key);
        self.entries
            .range(pos..)
            .next()
            .or_else(|| self.entries.iter().next())
            .map(|(_, node)| node)
    }

    /// Distinct physical nodes on the ring
    pub fn members(&self) -> BTreeSet<Node> {
        self.entries.values().cloned().collect()
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.entries.values().any(|n| n.id == node.id)
    }

    /// Number of virtual positions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS, HashAlgorithm::default())
    }
}

/// Snapshot-swapped ring shared between membership refresh and requests
///
/// Readers clone an `Arc` to the current ring and work on that snapshot;
/// the read lock is held only for the clone. Mutations are serialized,
/// applied to a private copy, then swapped in as a whole.
pub struct SharedRing {
    current: RwLock<Arc<HashRing>>,
    writer: Mutex<()>,
}

impl SharedRing {
    pub fn new(ring: HashRing) -> Self {
        Self {
            current: RwLock::new(Arc::new(ring)),
            writer: Mutex::new(()),
        }
    }

    /// Current ring; stays valid and unchanged however long it is held
    pub fn snapshot(&self) -> Arc<HashRing> {
        // A poisoned lock still holds a complete ring: swaps are a single store.
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Apply `f` to a copy of the current ring and publish the result
    pub fn update<F>(&self, f: F) -> Arc<HashRing>
    where
        F: FnOnce(&mut HashRing),
    {
        let _writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = (*self.snapshot()).clone();
        f(&mut next);
        let next = Arc::new(next);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = next.clone();
        next
    }

    /// Publish a freshly built ring
    pub fn replace(&self, ring: HashRing) -> Arc<HashRing> {
        self.update(|current| *current = ring)
    }

    pub fn add_node(&self, node: &Node) -> Arc<HashRing> {
        self.update(|ring| ring.add_node(node))
    }

    pub fn remove_node(&self, node: &Node) -> Arc<HashRing> {
        self.update(|ring| ring.remove_node(node))
    }

    pub fn locate(&self, key: &str) -> Option<Node> {
        self.snapshot().locate(key).cloned()
    }

    pub fn members(&self) -> BTreeSet<Node> {
        self.snapshot().members()
    }
}

impl Default for SharedRing {
    fn default() -> Self {
        Self::new(HashRing::default())
    }
}
