//! Ordered index with disk-resident values.
//!
//! A B-tree whose leaf entries hold either an in-memory value or a marker
//! meaning the value was spilled to secondary storage under the same key.
//! Spilled values are brought back transparently by [`OrderedIndex::get`].
//!
//! Layout:
//! ```text
//!                 [S | C]                  internal: min key -> child
//!                /       \
//!        [S | A | B]   [C | D | E]         leaves: key -> Resident / OnDisk
//! ```
//! `S` is the sentinel. It is the leftmost entry of every node on the left
//! spine, so descent never has to special-case keys below every real key.

use std::fmt::Debug;

use tessera_common::{Result, TesseraError, DEFAULT_FANOUT, MIN_FANOUT};
use tracing::{debug, trace};

use super::store::NodeStore;
use super::types::{
    child_index, insertion_point, IndexKey, InternalEntry, LeafEntry, Node, NodeId, Slot,
};
use crate::persistence::{LoadObserver, PersistenceManager};

/// Position of a leaf entry.
type Location = (NodeId, usize);

/// Ordered map from key to value with optional spill to secondary storage.
pub struct OrderedIndex<K, V> {
    nodes: NodeStore<K, V>,
    root: NodeId,
    /// Number of internal levels above the leaves.
    height: usize,
    fanout: usize,
    /// Live entries (resident or on disk).
    len: usize,
    persistence: Option<Box<dyn PersistenceManager<K, V>>>,
    observer: Option<Box<dyn LoadObserver<K>>>,
}

impl<K: Ord + Clone + Debug, V> OrderedIndex<K, V> {
    /// Creates an empty index with the default fanout.
    pub fn new() -> Self {
        let mut nodes = NodeStore::new();
        let root = nodes.allocate(Node::Leaf(vec![LeafEntry {
            key: IndexKey::Sentinel,
            slot: Slot::Vacant,
        }]));
        Self {
            nodes,
            root,
            height: 0,
            fanout: DEFAULT_FANOUT,
            len: 0,
            persistence: None,
            observer: None,
        }
    }

    /// Creates an empty index whose nodes split when they reach `fanout` entries.
    pub fn with_fanout(fanout: usize) -> Result<Self> {
        if fanout < MIN_FANOUT || fanout % 2 != 0 {
            return Err(TesseraError::Config(format!(
                "fanout {} must be even and at least {}",
                fanout, MIN_FANOUT
            )));
        }
        let mut index = Self::new();
        index.fanout = fanout;
        Ok(index)
    }

    /// Attaches or replaces the secondary-storage collaborator.
    pub fn bind(&mut self, persistence: Box<dyn PersistenceManager<K, V>>) {
        self.persistence = Some(persistence);
    }

    /// Registers a callback fired whenever a spilled value is brought back.
    pub fn observe(&mut self, observer: Box<dyn LoadObserver<K>>) {
        self.observer = Some(observer);
    }

    /// Returns the value for `key`, loading it from secondary storage if needed.
    ///
    /// A loaded value becomes resident again and its stored copy is deleted.
    pub fn get(&mut self, key: &K) -> Result<Option<&V>> {
        Ok(self.get_mut(key)?.map(|value| &*value))
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, key: &K) -> Result<Option<&mut V>> {
        let Some(location) = self.locate(key) else {
            return Ok(None);
        };

        if matches!(self.slot(location), Some(Slot::OnDisk)) {
            let value = self.load(key)?;
            if let Some(slot) = self.slot_mut(location) {
                *slot = Slot::Resident(value);
            }
            if let Some(observer) = &self.observer {
                observer.on_load(key);
            }
        }

        match self.slot_mut(location) {
            Some(Slot::Resident(value)) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    /// Returns the resident value for `key` without touching secondary storage.
    pub fn peek(&self, key: &K) -> Option<&V> {
        match self.locate(key).and_then(|location| self.slot(location)) {
            Some(Slot::Resident(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns true if the value for `key` currently lives in secondary storage.
    pub fn is_on_disk(&self, key: &K) -> bool {
        matches!(
            self.locate(key).and_then(|location| self.slot(location)),
            Some(Slot::OnDisk)
        )
    }

    /// Returns true if `key` has a value, resident or on disk.
    pub fn contains(&self, key: &K) -> bool {
        self.locate(key)
            .and_then(|location| self.slot(location))
            .is_some_and(Slot::is_live)
    }

    /// Inserts or overwrites `key`, returning the previous value.
    ///
    /// Overwriting a spilled entry reads the old value back and deletes the
    /// stored copy first.
    pub fn put(&mut self, key: K, value: V) -> Result<Option<V>> {
        if let Some(location) = self.locate(&key) {
            let was_live = self.slot(location).is_some_and(Slot::is_live);
            let previous = self.take(location, &key)?;
            if let Some(slot) = self.slot_mut(location) {
                *slot = Slot::Resident(value);
            }
            if !was_live {
                self.len += 1;
            }
            return Ok(previous);
        }

        if let Some(sibling) = self.insert(self.root, key, value) {
            let old_root = self.root;
            let entries = vec![
                InternalEntry {
                    key: self.nodes.get(old_root).first_key().clone(),
                    child: old_root,
                },
                InternalEntry {
                    key: self.nodes.get(sibling).first_key().clone(),
                    child: sibling,
                },
            ];
            self.root = self.nodes.allocate(Node::Internal(entries));
            self.height += 1;
            debug!(root = %self.root, height = self.height, "ordered index grew a level");
        }
        self.len += 1;
        Ok(None)
    }

    /// Logically deletes `key`, returning the value it held.
    ///
    /// The leaf entry stays in place and is reused by a later put.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>> {
        let Some(location) = self.locate(key) else {
            return Ok(None);
        };
        let was_live = self.slot(location).is_some_and(Slot::is_live);
        let previous = self.take(location, key)?;
        if was_live {
            self.len -= 1;
        }
        Ok(previous)
    }

    /// Spills the resident value for `key` to secondary storage.
    ///
    /// Fails with `NotConfigured` when no collaborator is bound and with
    /// `NotFound` when the key has no in-memory value.
    pub fn move_to_disk(&mut self, key: &K) -> Result<()> {
        let persistence = self.persistence.as_deref().ok_or_else(|| {
            TesseraError::NotConfigured("no persistence manager bound".to_string())
        })?;
        let location = self
            .locate(key)
            .filter(|location| matches!(self.slot(*location), Some(Slot::Resident(_))))
            .ok_or_else(|| TesseraError::NotFound(format!("no resident value for {:?}", key)))?;

        if let Some(Slot::Resident(value)) = self.slot(location) {
            persistence.serialize(key, value)?;
        }
        if let Some(slot) = self.slot_mut(location) {
            *slot = Slot::OnDisk;
        }
        trace!(?key, "moved value to disk");
        Ok(())
    }

    /// Live keys in ascending order.
    pub fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.len);
        self.collect_keys(self.root, &mut keys);
        keys
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no key has a value.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of internal levels above the leaves.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Maximum entries per node.
    pub fn fanout(&self) -> usize {
        self.fanout
    }

    fn collect_keys(&self, node: NodeId, keys: &mut Vec<K>) {
        match self.nodes.get(node) {
            Node::Leaf(entries) => keys.extend(
                entries
                    .iter()
                    .filter(|entry| entry.slot.is_live())
                    .filter_map(|entry| entry.key.real().cloned()),
            ),
            Node::Internal(entries) => {
                for entry in entries {
                    self.collect_keys(entry.child, keys);
                }
            }
        }
    }

    /// Finds the leaf entry holding `key`, live or vacant.
    fn locate(&self, key: &K) -> Option<Location> {
        let mut node = self.root;
        loop {
            match self.nodes.get(node) {
                Node::Internal(entries) => node = entries[child_index(entries, key)].child,
                Node::Leaf(entries) => {
                    return entries
                        .iter()
                        .position(|entry| entry.key.is(key))
                        .map(|pos| (node, pos));
                }
            }
        }
    }

    fn slot(&self, (leaf, pos): Location) -> Option<&Slot<V>> {
        self.nodes.leaf_entry(leaf, pos).map(|entry| &entry.slot)
    }

    fn slot_mut(&mut self, (leaf, pos): Location) -> Option<&mut Slot<V>> {
        self.nodes.leaf_entry_mut(leaf, pos).map(|entry| &mut entry.slot)
    }

    /// Reads a spilled value and deletes its stored copy.
    fn load(&self, key: &K) -> Result<V> {
        let persistence = self.persistence.as_deref().ok_or_else(|| {
            TesseraError::NotConfigured("no persistence manager bound".to_string())
        })?;
        let value = persistence
            .deserialize(key)?
            .ok_or_else(|| TesseraError::NotFound(format!("no stored value for {:?}", key)))?;
        persistence.delete(key)?;
        trace!(?key, "loaded value from disk");
        Ok(value)
    }

    /// Empties a slot, returning its value. Spilled values are loaded first.
    fn take(&mut self, location: Location, key: &K) -> Result<Option<V>> {
        let loaded = match self.slot(location) {
            Some(Slot::OnDisk) => Some(self.load(key)?),
            _ => None,
        };
        let Some(slot) = self.slot_mut(location) else {
            return Ok(None);
        };
        match std::mem::replace(slot, Slot::Vacant) {
            Slot::Resident(value) => Ok(Some(value)),
            Slot::OnDisk | Slot::Vacant => Ok(loaded),
        }
    }

    /// Inserts below `node`. Returns the new sibling if `node` split.
    fn insert(&mut self, node: NodeId, key: K, value: V) -> Option<NodeId> {
        let descend = match self.nodes.get(node) {
            Node::Leaf(_) => None,
            Node::Internal(entries) => {
                let j = child_index(entries, &key);
                Some((j, entries[j].child))
            }
        };

        match descend {
            None => {
                if let Node::Leaf(entries) = self.nodes.get_mut(node) {
                    let j = insertion_point(entries, &key);
                    entries.insert(
                        j,
                        LeafEntry {
                            key: IndexKey::Real(key),
                            slot: Slot::Resident(value),
                        },
                    );
                }
            }
            Some((j, child)) => {
                let sibling = self.insert(child, key, value)?;
                let sibling_key = self.nodes.get(sibling).first_key().clone();
                if let Node::Internal(entries) = self.nodes.get_mut(node) {
                    entries.insert(
                        j + 1,
                        InternalEntry {
                            key: sibling_key,
                            child: sibling,
                        },
                    );
                }
            }
        }

        self.split_if_full(node)
    }

    fn split_if_full(&mut self, node: NodeId) -> Option<NodeId> {
        if self.nodes.get(node).len() < self.fanout {
            return None;
        }
        let upper = self.nodes.get_mut(node).split_upper_half();
        let sibling = self.nodes.allocate(upper);
        trace!(%node, %sibling, "split ordered index node");
        Some(sibling)
    }
}

impl<K: Ord + Clone + Debug, V> Default for OrderedIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
