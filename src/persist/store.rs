//! Durable key-value stores
//!
//! The engine only needs `put`/`get` of opaque bytes. Record layout is
//! decided one level up in [`crate::persist::progress`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Longest hex-encoded key used verbatim as a file stem
const MAX_HEX_STEM: usize = 200;

/// Errors from key-value stores and record encoding
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt record for '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Minimal durable key-value contract
pub trait KeyValueStore: Send + Sync {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

// =============================================================================
// Memory Store
// =============================================================================

/// Process-local store; contents vanish with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Sorted list of stored keys
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KeyValueStore for MemoryStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }
}

// =============================================================================
// File Store
// =============================================================================

/// One file per key under a directory.
///
/// Keys are stream URLs and contain path separators, so file names are the
/// hex encoding of the key. Keys too long for a file name are stored under
/// the SHA-256 of the key instead. Writes go to a temp file and are renamed
/// into place, so a crash never leaves a half-written record.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Default location (~/.local/share/sorastream/progress)
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("sorastream").join("progress"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

impl KeyValueStore for FileStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// File-name-safe stem for a key, never longer than `MAX_HEX_STEM`
fn encode_key(key: &str) -> String {
    if key.len() * 2 <= MAX_HEX_STEM {
        to_hex(key.as_bytes())
    } else {
        format!("sha256-{}", to_hex(&Sha256::digest(key.as_bytes())))
    }
}
