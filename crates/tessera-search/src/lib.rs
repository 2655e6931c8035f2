//! Word search for Tessera.
//!
//! This crate provides a trie that maps alphanumeric words to sets of ids,
//! with exact, prefix, and bulk-delete queries.

mod trie;

pub use trie::{symbol_index, SearchIndex, ALPHABET_SIZE};
