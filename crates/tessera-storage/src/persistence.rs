//! Secondary-storage contract used by the ordered index.

use tessera_common::Result;

/// Moves values between memory and secondary storage.
///
/// Implementations are bound to an [`OrderedIndex`](crate::OrderedIndex)
/// with `bind` and called synchronously on the caller's thread.
pub trait PersistenceManager<K, V>: Send {
    /// Writes `value` to secondary storage under `key`.
    fn serialize(&self, key: &K, value: &V) -> Result<()>;

    /// Reads the value stored under `key`. Returns None if nothing is stored.
    fn deserialize(&self, key: &K) -> Result<Option<V>>;

    /// Removes the stored copy of `key`. Returns whether anything was removed.
    fn delete(&self, key: &K) -> Result<bool>;
}

/// Notified when the ordered index materializes a value from secondary storage.
pub trait LoadObserver<K>: Send {
    /// Called once per value brought back into memory.
    fn on_load(&self, key: &K);
}
