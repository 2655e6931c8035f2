//! Least-recently-used eviction order for resident documents.

use tessera_common::{Result, TesseraError};

/// Supplies the current priority of a queued key. Lower values leave first.
///
/// Priorities are read on every comparison and never cached, so they may
/// change after a key is queued. Call [`EvictionQueue::re_heapify`] once a
/// key's priority has moved. Unknown keys rank lowest.
pub trait PriorityOracle<K> {
    fn priority(&self, key: &K) -> Option<u64>;
}

impl<K, F> PriorityOracle<K> for F
where
    F: Fn(&K) -> Option<u64>,
{
    fn priority(&self, key: &K) -> Option<u64> {
        self(key)
    }
}

/// Array-backed binary min-heap over keys.
///
/// The heap stores only keys; ordering comes from the oracle passed to each
/// mutating call. Locating a key is a linear scan because priorities change
/// without notice and no position index could be trusted.
#[derive(Debug, Clone)]
pub struct EvictionQueue<K> {
    heap: Vec<K>,
}

impl<K: PartialEq> EvictionQueue<K> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self { heap: Vec::new() }
    }

    /// Creates an empty queue with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
        }
    }

    /// Adds a key and sifts it up into place.
    pub fn insert(&mut self, key: K, oracle: &impl PriorityOracle<K>) {
        self.heap.push(key);
        self.sift_up(self.heap.len() - 1, oracle);
    }

    /// Removes and returns the key with the lowest priority.
    ///
    /// Fails with `NotFound` on an empty queue.
    pub fn remove(&mut self, oracle: &impl PriorityOracle<K>) -> Result<K> {
        if self.heap.is_empty() {
            return Err(TesseraError::NotFound(
                "eviction queue is empty".to_string(),
            ));
        }
        let min = self.heap.swap_remove(0);
        self.sift_down(0, oracle);
        Ok(min)
    }

    /// Restores heap order around `key` after its priority changed.
    ///
    /// Moves the key either up or down, never both. Fails with `NotFound` if
    /// the key is not queued.
    pub fn re_heapify(&mut self, key: &K, oracle: &impl PriorityOracle<K>) -> Result<()> {
        let pos = self.position(key).ok_or_else(|| {
            TesseraError::NotFound("key is not in the eviction queue".to_string())
        })?;
        self.fix(pos, oracle);
        Ok(())
    }

    /// Removes a specific key, returning it if it was queued.
    pub fn delete(&mut self, key: &K, oracle: &impl PriorityOracle<K>) -> Option<K> {
        let pos = self.position(key)?;
        let removed = self.heap.swap_remove(pos);
        if pos < self.heap.len() {
            self.fix(pos, oracle);
        }
        Some(removed)
    }

    /// Returns the key that `remove` would return.
    pub fn peek(&self) -> Option<&K> {
        self.heap.first()
    }

    /// Returns true if `key` is queued.
    pub fn contains(&self, key: &K) -> bool {
        self.position(key).is_some()
    }

    /// Number of queued keys.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if no keys are queued.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn position(&self, key: &K) -> Option<usize> {
        self.heap.iter().position(|queued| queued == key)
    }

    fn fix(&mut self, pos: usize, oracle: &impl PriorityOracle<K>) {
        if pos > 0 && self.less(pos, (pos - 1) / 2, oracle) {
            self.sift_up(pos, oracle);
        } else {
            self.sift_down(pos, oracle);
        }
    }

    #[inline]
    fn rank(&self, pos: usize, oracle: &impl PriorityOracle<K>) -> u64 {
        oracle.priority(&self.heap[pos]).unwrap_or(u64::MIN)
    }

    #[inline]
    fn less(&self, a: usize, b: usize, oracle: &impl PriorityOracle<K>) -> bool {
        self.rank(a, oracle) < self.rank(b, oracle)
    }

    fn sift_up(&mut self, mut pos: usize, oracle: &impl PriorityOracle<K>) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.less(pos, parent, oracle) {
                break;
            }
            self.heap.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize, oracle: &impl PriorityOracle<K>) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let smaller = if right < len && self.less(right, left, oracle) {
                right
            } else {
                left
            };
            if !self.less(smaller, pos, oracle) {
                break;
            }
            self.heap.swap(pos, smaller);
            pos = smaller;
        }
    }
}

impl<K: PartialEq> Default for EvictionQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
