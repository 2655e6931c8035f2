//! File-backed persistence for spilled values.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tessera_common::{Result, StoreConfig};
use tracing::debug;

use crate::persistence::PersistenceManager;

/// File extension of stored values.
const EXTENSION: &str = ".json";

/// Encoded form of an empty key segment.
const EMPTY_SEGMENT: &str = "%";

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// On-disk record. The key is kept beside the value and checked on read.
#[derive(Serialize)]
struct StoredRef<'a, V> {
    key: &'a str,
    value: &'a V,
}

#[derive(Deserialize)]
struct Stored<V> {
    key: String,
    value: V,
}

/// Percent-encodes every byte outside `[A-Za-z0-9_-]`.
///
/// Encoded segments never contain `/` or `.`, so they cannot name `.`/`..`
/// and never collide with a file name carrying [`EXTENSION`].
fn encode_segment(segment: &str) -> String {
    if segment.is_empty() {
        return EMPTY_SEGMENT.to_string();
    }
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push('%');
            out.push(HEX[usize::from(byte >> 4)] as char);
            out.push(HEX[usize::from(byte & 0x0f)] as char);
        }
    }
    out
}

/// Configuration for disk persistence.
#[derive(Debug, Clone)]
pub struct DiskPersistenceConfig {
    /// Base directory for stored values.
    pub data_dir: PathBuf,
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl Default for DiskPersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            fsync_enabled: true,
        }
    }
}

impl From<&StoreConfig> for DiskPersistenceConfig {
    fn from(config: &StoreConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            fsync_enabled: config.fsync_enabled,
        }
    }
}

/// Stores one pretty-printed JSON file per key.
///
/// A key such as `http://example.com/docs/a` lands at
/// `<data_dir>/http%3A%2F%2F/example%2Ecom/docs/a.json`.
pub struct DiskPersistence<V> {
    config: DiskPersistenceConfig,
    _value: PhantomData<fn() -> V>,
}

impl<V> DiskPersistence<V> {
    /// Creates the data directory if needed.
    pub fn new(config: DiskPersistenceConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        Ok(Self {
            config,
            _value: PhantomData,
        })
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Path of the file holding `key`.
    ///
    /// Distinct keys always map to distinct paths. A `scheme://` prefix
    /// becomes one directory, every `/`-separated segment after it becomes
    /// a directory, and the last segment names the file.
    pub fn file_path(&self, key: &str) -> PathBuf {
        let mut path = self.config.data_dir.clone();
        let rest = match key.find("://") {
            Some(pos) => {
                path.push(encode_segment(&key[..pos + 3]));
                &key[pos + 3..]
            }
            None => key,
        };

        let name = match rest.rsplit_once('/') {
            Some((dirs, name)) => {
                for segment in dirs.split('/') {
                    path.push(encode_segment(segment));
                }
                name
            }
            None => rest,
        };
        path.push(format!("{}{}", encode_segment(name), EXTENSION));
        path
    }
}

impl<K, V> PersistenceManager<K, V> for DiskPersistence<V>
where
    K: AsRef<str>,
    V: Serialize + DeserializeOwned,
{
    fn serialize(&self, key: &K, value: &V) -> Result<()> {
        let path = self.file_path(key.as_ref());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(&StoredRef {
            key: key.as_ref(),
            value,
        })?;
        let mut file = fs::File::create(&path)?;
        file.write_all(&json)?;
        if self.config.fsync_enabled {
            file.sync_all()?;
        }

        debug!(
            key = key.as_ref(),
            path = %path.display(),
            bytes = json.len(),
            "wrote value to disk"
        );
        Ok(())
    }

    fn deserialize(&self, key: &K) -> Result<Option<V>> {
        let path = self.file_path(key.as_ref());
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: Stored<V> = serde_json::from_slice(&bytes)?;
        if stored.key != key.as_ref() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!(
                    "{} holds {:?}, expected {:?}",
                    path.display(),
                    stored.key,
                    key.as_ref()
                ),
            )
            .into());
        }

        debug!(key = key.as_ref(), path = %path.display(), "read value from disk");
        Ok(Some(stored.value))
    }

    fn delete(&self, key: &K) -> Result<bool> {
        let path = self.file_path(key.as_ref());
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key = key.as_ref(), path = %path.display(), "deleted value from disk");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
