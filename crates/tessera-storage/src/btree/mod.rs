//! Ordered index implementation.
//!
//! A B-tree keyed by any totally ordered type. Leaf entries hold either a
//! resident value or a marker for a value spilled to secondary storage:
//!
//! ```text
//! Node::Internal  [ (min key, child) ... ]     at most `fanout` entries
//! Node::Leaf      [ (key, Slot) ... ]          Slot = Resident(V) | OnDisk | Vacant
//! ```
//!
//! Nodes live in a [`NodeStore`] arena and refer to each other by
//! [`NodeId`]. A node that reaches `fanout` entries moves its upper half
//! into a new sibling; a root split adds a level.

pub mod index;
pub mod store;
pub mod types;

pub use index::OrderedIndex;
pub use store::NodeStore;
pub use types::{IndexKey, InternalEntry, LeafEntry, Node, NodeId, Slot};
