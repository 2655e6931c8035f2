//! Node and entry types for the ordered index.

use std::cmp::Ordering;

/// Handle of a node in the [`NodeStore`](super::store::NodeStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Key stored in a node entry.
///
/// `Sentinel` sorts before every real key and is equal only to itself. It
/// occupies the leftmost entry of the root's left spine so descent always
/// has a left branch to take.
#[derive(Debug, Clone)]
pub enum IndexKey<K> {
    Sentinel,
    Real(K),
}

impl<K: Ord> IndexKey<K> {
    /// Returns true if `key` sorts strictly before this entry key.
    #[inline]
    pub fn follows(&self, key: &K) -> bool {
        match self {
            IndexKey::Sentinel => false,
            IndexKey::Real(k) => key < k,
        }
    }

    /// Returns true if this entry key is the real key `key`.
    #[inline]
    pub fn is(&self, key: &K) -> bool {
        match self {
            IndexKey::Sentinel => false,
            IndexKey::Real(k) => k == key,
        }
    }

    /// Returns the real key, if any.
    pub fn real(&self) -> Option<&K> {
        match self {
            IndexKey::Sentinel => None,
            IndexKey::Real(k) => Some(k),
        }
    }
}

impl<K: Ord> PartialEq for IndexKey<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Ord> Eq for IndexKey<K> {}

impl<K: Ord> PartialOrd for IndexKey<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord> Ord for IndexKey<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexKey::Sentinel, IndexKey::Sentinel) => Ordering::Equal,
            (IndexKey::Sentinel, IndexKey::Real(_)) => Ordering::Less,
            (IndexKey::Real(_), IndexKey::Sentinel) => Ordering::Greater,
            (IndexKey::Real(a), IndexKey::Real(b)) => a.cmp(b),
        }
    }
}

/// Where a leaf entry's value lives.
#[derive(Debug, Clone)]
pub enum Slot<V> {
    /// Value is in memory.
    Resident(V),
    /// Value lives in secondary storage under the entry's key.
    OnDisk,
    /// Key was logically deleted; the entry is reused by a later put.
    Vacant,
}

impl<V> Slot<V> {
    /// Returns true if the slot holds a value, in memory or on disk.
    pub fn is_live(&self) -> bool {
        !matches!(self, Slot::Vacant)
    }
}

/// Leaf entry: a key and its value slot.
#[derive(Debug, Clone)]
pub struct LeafEntry<K, V> {
    pub key: IndexKey<K>,
    pub slot: Slot<V>,
}

/// Internal entry: the minimum key reachable through `child`.
#[derive(Debug, Clone)]
pub struct InternalEntry<K> {
    pub key: IndexKey<K>,
    pub child: NodeId,
}

/// Ordered index node. Entries are dense and sorted by key.
#[derive(Debug, Clone)]
pub enum Node<K, V> {
    Leaf(Vec<LeafEntry<K, V>>),
    Internal(Vec<InternalEntry<K>>),
}

impl<K, V> Node<K, V> {
    /// Number of entries in the node.
    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(entries) => entries.len(),
            Node::Internal(entries) => entries.len(),
        }
    }

    /// Returns true if the node has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true for leaf nodes.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Smallest key in the node. Nodes are never empty once linked in.
    pub fn first_key(&self) -> &IndexKey<K> {
        match self {
            Node::Leaf(entries) => &entries[0].key,
            Node::Internal(entries) => &entries[0].key,
        }
    }

    /// Moves the upper half of the entries into a new node.
    pub fn split_upper_half(&mut self) -> Node<K, V> {
        match self {
            Node::Leaf(entries) => {
                let half = entries.len() / 2;
                Node::Leaf(entries.split_off(half))
            }
            Node::Internal(entries) => {
                let half = entries.len() / 2;
                Node::Internal(entries.split_off(half))
            }
        }
    }
}

/// Index of the child to descend into for `key`: the entry whose next
/// sibling's key is greater than `key`, or the last entry.
#[inline]
pub fn child_index<K: Ord>(entries: &[InternalEntry<K>], key: &K) -> usize {
    entries
        .iter()
        .skip(1)
        .position(|entry| entry.key.follows(key))
        .unwrap_or(entries.len().saturating_sub(1))
}

/// Position at which `key` is inserted into a leaf: the first entry with a
/// greater key, or the end.
#[inline]
pub fn insertion_point<K: Ord, V>(entries: &[LeafEntry<K, V>], key: &K) -> usize {
    entries
        .iter()
        .position(|entry| entry.key.follows(key))
        .unwrap_or(entries.len())
}
