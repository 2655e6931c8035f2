//! Document identifiers.

use crate::error::{Result, TesseraError};
use serde::{Deserialize, Serialize};

/// Identifier of a stored document.
///
/// A URI-like string (`scheme://authority/path`). Keys order
/// lexicographically, which is the order the ordered index places them in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Creates a key, rejecting empty or blank identifiers.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(TesseraError::InvalidArgument(
                "document key cannot be empty".to_string(),
            ));
        }
        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DocumentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentKey {
    type Error = TesseraError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for DocumentKey {
    type Error = TesseraError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DocumentKey> for String {
    fn from(key: DocumentKey) -> Self {
        key.0
    }
}

impl std::str::FromStr for DocumentKey {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
