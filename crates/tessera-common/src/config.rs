//! Configuration structures for Tessera.

use crate::error::{Result, TesseraError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default ordered-index fanout.
pub const DEFAULT_FANOUT: usize = 6;

/// Smallest fanout that still leaves two entries per node after a split.
pub const MIN_FANOUT: usize = 4;

/// Document store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory for spilled documents.
    pub data_dir: PathBuf,
    /// Maximum number of resident documents (None = unbounded).
    pub max_document_count: Option<usize>,
    /// Maximum resident bytes across all documents (None = unbounded).
    pub max_document_bytes: Option<usize>,
    /// Maximum entries per ordered-index node.
    pub fanout: usize,
    /// Enable fsync after writing a spilled document.
    pub fsync_enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            max_document_count: None,
            max_document_bytes: None,
            fanout: DEFAULT_FANOUT,
            fsync_enabled: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration rooted at the given data directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Checks that the configuration describes a usable store.
    ///
    /// Node splits move exactly half of a full node, so the fanout must be
    /// even and large enough that both halves keep two entries.
    pub fn validate(&self) -> Result<()> {
        if self.fanout < MIN_FANOUT {
            return Err(TesseraError::Config(format!(
                "fanout {} is below the minimum of {}",
                self.fanout, MIN_FANOUT
            )));
        }
        if self.fanout % 2 != 0 {
            return Err(TesseraError::Config(format!(
                "fanout {} must be even",
                self.fanout
            )));
        }
        Ok(())
    }

    /// Returns true if either budget is bounded.
    pub fn is_bounded(&self) -> bool {
        self.max_document_count.is_some() || self.max_document_bytes.is_some()
    }
}
