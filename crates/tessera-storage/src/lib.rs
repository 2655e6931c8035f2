//! Storage layer for Tessera.
//!
//! This crate provides:
//! - An ordered index whose values can be spilled to secondary storage
//! - The persistence contract the index spills through
//! - A file-backed JSON implementation of that contract

pub mod btree;
mod disk;
mod persistence;

pub use btree::{IndexKey, NodeId, OrderedIndex, Slot};
pub use disk::{DiskPersistence, DiskPersistenceConfig};
pub use persistence::{LoadObserver, PersistenceManager};
