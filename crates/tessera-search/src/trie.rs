//! Trie over alphanumeric words mapping each word to a set of ids.
//!
//! Each node has one child slot per symbol of the alphabet:
//!
//! ```text
//! 'A'..='Z' -> 0..=25
//! 'a'..='z' -> 26..=51
//! '0'..='9' -> 52..=61
//! ```
//!
//! Words are case-sensitive. Deleting the last id under a word detaches the
//! chain of nodes that only existed to reach it.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;

use tessera_common::{Result, TesseraError};

/// Number of symbols in the alphabet.
pub const ALPHABET_SIZE: usize = 62;

/// Maps a character to its child slot, or None if it is outside the alphabet.
#[inline]
pub fn symbol_index(c: char) -> Option<usize> {
    match c {
        'A'..='Z' => Some(c as usize - 'A' as usize),
        'a'..='z' => Some(c as usize - 'a' as usize + 26),
        '0'..='9' => Some(c as usize - '0' as usize + 52),
        _ => None,
    }
}

/// Converts a word into its path of child slots.
fn path(word: &str) -> Option<Vec<usize>> {
    word.chars().map(symbol_index).collect()
}

struct Node<T> {
    children: [Option<Box<Node<T>>>; ALPHABET_SIZE],
    child_count: usize,
    ids: HashSet<T>,
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            children: std::array::from_fn(|_| None),
            child_count: 0,
            ids: HashSet::new(),
        }
    }

    fn child(&self, slot: usize) -> Option<&Node<T>> {
        self.children[slot].as_deref()
    }

    fn child_mut(&mut self, slot: usize) -> Option<&mut Node<T>> {
        self.children[slot].as_deref_mut()
    }

    fn child_or_insert(&mut self, slot: usize) -> &mut Node<T> {
        if self.children[slot].is_none() {
            self.child_count += 1;
        }
        self.children[slot].get_or_insert_with(|| Box::new(Node::new()))
    }

    fn detach(&mut self, slot: usize) {
        if self.children[slot].take().is_some() {
            self.child_count -= 1;
        }
    }

    fn clear_children(&mut self) {
        for child in self.children.iter_mut() {
            *child = None;
        }
        self.child_count = 0;
    }

    /// Whether this node can go once the edge below it on the deletion
    /// path is gone.
    fn prunable(&self, terminal: bool) -> bool {
        if terminal {
            self.child_count == 0
        } else {
            self.child_count == 1 && self.ids.is_empty()
        }
    }
}

/// Case-sensitive word index over the ASCII letters and digits.
pub struct SearchIndex<T> {
    root: Node<T>,
}

impl<T: Eq + Hash + Clone> SearchIndex<T> {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    /// Associates `id` with `word`. Associating the same pair twice is a no-op.
    ///
    /// Fails with `InvalidArgument` if `word` has a character outside the
    /// alphabet.
    pub fn put(&mut self, word: &str, id: T) -> Result<()> {
        let slots = path(word).ok_or_else(|| {
            TesseraError::InvalidArgument(format!(
                "{:?} contains non-alphanumeric characters",
                word
            ))
        })?;

        let mut node = &mut self.root;
        for slot in slots {
            node = node.child_or_insert(slot);
        }
        node.ids.insert(id);
        Ok(())
    }

    /// Ids stored under exactly `word`, sorted by `compare`.
    pub fn get_all_sorted<F>(&self, word: &str, mut compare: F) -> Vec<T>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let Some(node) = self.find(word) else {
            return Vec::new();
        };
        let mut ids: Vec<T> = node.ids.iter().cloned().collect();
        ids.sort_by(&mut compare);
        ids
    }

    /// Ids stored under any word starting with `prefix`, de-duplicated and
    /// sorted by `compare`.
    pub fn get_all_with_prefix_sorted<F>(&self, prefix: &str, mut compare: F) -> Vec<T>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let Some(node) = self.find(prefix) else {
            return Vec::new();
        };
        let mut ids: Vec<T> = Self::collect_subtree(node).into_iter().collect();
        ids.sort_by(&mut compare);
        ids
    }

    /// Removes `id` from `word`, returning it if it was present.
    pub fn delete(&mut self, word: &str, id: &T) -> Option<T> {
        self.remove_ids(word, Some(id)).into_iter().next()
    }

    /// Removes every id stored under exactly `word`.
    pub fn delete_all(&mut self, word: &str) -> HashSet<T> {
        self.remove_ids(word, None)
    }

    /// Removes every id stored under `prefix` or any word extending it.
    pub fn delete_all_with_prefix(&mut self, prefix: &str) -> HashSet<T> {
        let Some(node) = self.find_mut(prefix) else {
            return HashSet::new();
        };
        let mut removed = Self::collect_subtree(node);
        node.clear_children();
        removed.extend(self.delete_all(prefix));
        removed
    }

    /// Returns true if `id` is stored under exactly `word`.
    pub fn contains(&self, word: &str, id: &T) -> bool {
        self.find(word).is_some_and(|node| node.ids.contains(id))
    }

    /// Returns true if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.root.child_count == 0 && self.root.ids.is_empty()
    }

    fn find(&self, word: &str) -> Option<&Node<T>> {
        let mut node = &self.root;
        for slot in path(word)? {
            node = node.child(slot)?;
        }
        Some(node)
    }

    fn find_mut(&mut self, word: &str) -> Option<&mut Node<T>> {
        let mut node = &mut self.root;
        for slot in path(word)? {
            node = node.child_mut(slot)?;
        }
        Some(node)
    }

    fn collect_subtree(start: &Node<T>) -> HashSet<T> {
        let mut ids = HashSet::new();
        let mut pending = vec![start];
        while let Some(node) = pending.pop() {
            ids.extend(node.ids.iter().cloned());
            pending.extend(node.children.iter().filter_map(|child| child.as_deref()));
        }
        ids
    }

    /// Removes `id` (or every id when None) from the node for `word`, then
    /// detaches the deepest run of nodes left with nothing to hold.
    fn remove_ids(&mut self, word: &str, id: Option<&T>) -> HashSet<T> {
        let Some(slots) = path(word) else {
            return HashSet::new();
        };

        // Depth of the topmost node in the run of prunable nodes that ends at
        // the terminal node. The edge above it is the one to cut.
        let mut cut: Option<usize> = None;
        let mut node = &self.root;
        for (depth, &slot) in slots.iter().enumerate() {
            let Some(next) = node.child(slot) else {
                return HashSet::new();
            };
            if !next.prunable(depth + 1 == slots.len()) {
                cut = None;
            } else if cut.is_none() {
                cut = Some(depth);
            }
            node = next;
        }

        let Some(terminal) = self.find_mut(word) else {
            return HashSet::new();
        };
        let removed: HashSet<T> = match id {
            Some(id) => terminal.ids.take(id).into_iter().collect(),
            None => std::mem::take(&mut terminal.ids),
        };
        if !terminal.ids.is_empty() {
            return removed;
        }

        if let Some(depth) = cut {
            let mut parent = &mut self.root;
            for &slot in &slots[..depth] {
                match parent.child_mut(slot) {
                    Some(child) => parent = child,
                    None => return removed,
                }
            }
            parent.detach(slots[depth]);
        }
        removed
    }
}

impl<T: Eq + Hash + Clone> Default for SearchIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
