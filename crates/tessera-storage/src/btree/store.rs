//! In-memory node storage for the ordered index.

use super::types::{LeafEntry, Node, NodeId};

/// Arena of ordered index nodes.
///
/// Node ids map directly to Vec indices. Nodes are never freed; the index
/// only grows by splitting.
pub struct NodeStore<K, V> {
    nodes: Vec<Node<K, V>>,
}

impl<K, V> NodeStore<K, V> {
    /// Creates an empty node store.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Stores a node and returns its id.
    #[inline]
    pub fn allocate(&mut self, node: Node<K, V>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Gets a node by id.
    #[inline]
    pub fn get(&self, id: NodeId) -> &Node<K, V> {
        &self.nodes[id.0 as usize]
    }

    /// Gets a mutable node by id.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        &mut self.nodes[id.0 as usize]
    }

    /// Gets a leaf entry. Returns None if `id` is not a leaf or `pos` is out of range.
    #[inline]
    pub fn leaf_entry(&self, id: NodeId, pos: usize) -> Option<&LeafEntry<K, V>> {
        match self.get(id) {
            Node::Leaf(entries) => entries.get(pos),
            Node::Internal(_) => None,
        }
    }

    /// Gets a mutable leaf entry.
    #[inline]
    pub fn leaf_entry_mut(&mut self, id: NodeId, pos: usize) -> Option<&mut LeafEntry<K, V>> {
        match self.get_mut(id) {
            Node::Leaf(entries) => entries.get_mut(pos),
            Node::Internal(_) => None,
        }
    }

    /// Number of allocated nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no nodes have been allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<K, V> Default for NodeStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
