//! Residency management for Tessera.
//!
//! This crate provides the eviction order for resident documents:
//! - A binary min-heap over keys with externally owned priorities
//! - On-demand re-ordering when a key's priority changes
//! - Removal of arbitrary keys when a document leaves memory early

mod queue;

pub use queue::{EvictionQueue, PriorityOracle};
