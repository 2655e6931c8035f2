//! Tessera document store.
//!
//! Ties the ordered index, eviction queue, word index and undo log together
//! behind [`DocumentStore`].

mod store;

pub use store::DocumentStore;
pub use tessera_common::{Document, DocumentFormat, DocumentKey, StoreConfig, TesseraError};
