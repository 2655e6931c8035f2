//! Tessera common types, errors, and utilities.
//!
//! This crate provides shared definitions used across all Tessera components.

pub mod config;
pub mod document;
pub mod error;
pub mod key;

pub use config::{StoreConfig, DEFAULT_FANOUT, MIN_FANOUT};
pub use document::{tokenize, word_counts, Document, DocumentFormat, Payload};
pub use error::{Result, TesseraError};
pub use key::DocumentKey;
