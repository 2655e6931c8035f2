//! Document values held by the store.

use crate::error::{Result, TesseraError};
use crate::key::DocumentKey;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// How submitted content is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentFormat {
    /// UTF-8 text, tokenized into a word map.
    Text,
    /// Opaque bytes, never indexed.
    Binary,
}

/// Document content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// Text with its word -> occurrence count map.
    Text {
        text: String,
        words: HashMap<String, u32>,
    },
    /// Raw bytes.
    Binary(Bytes),
}

/// A stored document.
///
/// Equality and hashing go through [`Document::fingerprint`], so two
/// documents with the same key and content are equal regardless of when
/// they were last used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    key: DocumentKey,
    payload: Payload,
    #[serde(skip)]
    last_use: u64,
}

impl Document {
    /// Creates a text document and derives its word map.
    pub fn text(key: DocumentKey, text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(TesseraError::InvalidArgument(format!(
                "text for {} cannot be empty or blank",
                key
            )));
        }
        let words = word_counts(&text);
        Ok(Self {
            key,
            payload: Payload::Text { text, words },
            last_use: 0,
        })
    }

    /// Creates a binary document.
    pub fn binary(key: DocumentKey, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.is_empty() {
            return Err(TesseraError::InvalidArgument(format!(
                "binary data for {} cannot be empty",
                key
            )));
        }
        Ok(Self {
            key,
            payload: Payload::Binary(data),
            last_use: 0,
        })
    }

    /// Builds a document from raw content in the given format.
    pub fn from_content(
        key: DocumentKey,
        content: Vec<u8>,
        format: DocumentFormat,
    ) -> Result<Self> {
        match format {
            DocumentFormat::Binary => Self::binary(key, content),
            DocumentFormat::Text => {
                let text = String::from_utf8(content).map_err(|e| {
                    TesseraError::InvalidArgument(format!("text for {} is not UTF-8: {}", key, e))
                })?;
                Self::text(key, text)
            }
        }
    }

    /// Returns the document key.
    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// Returns the payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Returns the text, if this is a text document.
    pub fn text_content(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text { text, .. } => Some(text),
            Payload::Binary(_) => None,
        }
    }

    /// Returns the bytes, if this is a binary document.
    pub fn binary_content(&self) -> Option<&Bytes> {
        match &self.payload {
            Payload::Binary(data) => Some(data),
            Payload::Text { .. } => None,
        }
    }

    /// Returns the format the document was created from.
    pub fn format(&self) -> DocumentFormat {
        match &self.payload {
            Payload::Text { .. } => DocumentFormat::Text,
            Payload::Binary(_) => DocumentFormat::Binary,
        }
    }

    /// Number of times `word` occurs. Always 0 for binary documents.
    pub fn word_count(&self, word: &str) -> u32 {
        match &self.payload {
            Payload::Text { words, .. } => words.get(word).copied().unwrap_or(0),
            Payload::Binary(_) => 0,
        }
    }

    /// Sum of counts of every distinct word starting with `prefix`.
    pub fn prefix_count(&self, prefix: &str) -> u32 {
        match &self.payload {
            Payload::Text { words, .. } => words
                .iter()
                .filter(|(word, _)| word.starts_with(prefix))
                .map(|(_, count)| *count)
                .sum(),
            Payload::Binary(_) => 0,
        }
    }

    /// Iterates the distinct words of a text document.
    pub fn words(&self) -> impl Iterator<Item = &str> + '_ {
        let words = match &self.payload {
            Payload::Text { words, .. } => Some(words.keys().map(String::as_str)),
            Payload::Binary(_) => None,
        };
        words.into_iter().flatten()
    }

    /// Returns a copy of the word map (empty for binary documents).
    pub fn word_map(&self) -> HashMap<String, u32> {
        match &self.payload {
            Payload::Text { words, .. } => words.clone(),
            Payload::Binary(_) => HashMap::new(),
        }
    }

    /// Size charged against the byte budget.
    pub fn byte_size(&self) -> usize {
        match &self.payload {
            Payload::Text { text, .. } => text.len(),
            Payload::Binary(data) => data.len(),
        }
    }

    /// Last-use stamp.
    pub fn last_use(&self) -> u64 {
        self.last_use
    }

    /// Sets the last-use stamp.
    pub fn set_last_use(&mut self, stamp: u64) {
        self.last_use = stamp;
    }

    /// Identity fingerprint over key, text and binary payload.
    pub fn fingerprint(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(self.key.as_str().as_bytes());
        match &self.payload {
            Payload::Text { text, .. } => {
                hasher.update(&[0]);
                hasher.update(text.as_bytes());
            }
            Payload::Binary(data) => {
                hasher.update(&[1]);
                hasher.update(data);
            }
        }
        hasher.finalize()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint() == other.fingerprint()
    }
}

impl Eq for Document {}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint().hash(state);
    }
}

/// Splits text on whitespace and keeps the ASCII letters and digits of each
/// token. Tokens with nothing left are dropped.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|token| {
            token
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
}

/// Counts occurrences of each token in `text`.
pub fn word_counts(text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for word in tokenize(text) {
        *counts.entry(word).or_insert(0) += 1;
    }
    counts
}
