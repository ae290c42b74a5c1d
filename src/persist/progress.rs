//! Progress Persister - resume records and the continue-watching registry
//!
//! Records are JSON encoded and stored under `resume/<stream key>`; the
//! continue-watching registry is a single JSON list under one key, upserted
//! by stream key so it never holds more than one entry per stream.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::{ContinueWatchingEntry, ResumeRecord};
use crate::persist::store::{KeyValueStore, StoreError};

const RESUME_PREFIX: &str = "resume/";
const HISTORY_KEY: &str = "continue_watching";

/// Durable home for resumable progress.
///
/// Callers on the playback path treat every error as non-fatal.
pub trait ProgressPersister: Send + Sync {
    /// Store the record for `stream_key`, replacing any previous one
    fn save(&self, stream_key: &str, record: &ResumeRecord) -> Result<(), StoreError>;

    fn load(&self, stream_key: &str) -> Result<Option<ResumeRecord>, StoreError>;

    /// Upsert the continue-watching entry for the entry's stream
    fn record_history(&self, entry: &ContinueWatchingEntry) -> Result<(), StoreError>;

    /// Continue-watching entries, most recent first
    fn history(&self) -> Result<Vec<ContinueWatchingEntry>, StoreError>;
}

impl<P: ProgressPersister + ?Sized> ProgressPersister for Arc<P> {
    fn save(&self, stream_key: &str, record: &ResumeRecord) -> Result<(), StoreError> {
        (**self).save(stream_key, record)
    }

    fn load(&self, stream_key: &str) -> Result<Option<ResumeRecord>, StoreError> {
        (**self).load(stream_key)
    }

    fn record_history(&self, entry: &ContinueWatchingEntry) -> Result<(), StoreError> {
        (**self).record_history(entry)
    }

    fn history(&self) -> Result<Vec<ContinueWatchingEntry>, StoreError> {
        (**self).history()
    }
}

/// [`ProgressPersister`] on top of any [`KeyValueStore`]
pub struct KvProgressPersister<S> {
    store: S,
    /// Serializes read-modify-write of the history list
    history_lock: Mutex<()>,
}

impl<S: KeyValueStore> KvProgressPersister<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            history_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn read_history(&self) -> Result<Vec<ContinueWatchingEntry>, StoreError> {
        match self.store.get(HISTORY_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                key: HISTORY_KEY.to_string(),
                source,
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// Storage key for a stream's resume record
pub fn resume_key(stream_key: &str) -> String {
    format!("{}{}", RESUME_PREFIX, stream_key)
}

impl<S: KeyValueStore> ProgressPersister for KvProgressPersister<S> {
    fn save(&self, stream_key: &str, record: &ResumeRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record).map_err(StoreError::Encode)?;
        self.store.put(&resume_key(stream_key), &bytes)
    }

    fn load(&self, stream_key: &str) -> Result<Option<ResumeRecord>, StoreError> {
        let key = resume_key(stream_key);
        let Some(bytes) = self.store.get(&key)? else {
            return Ok(None);
        };
        let record: ResumeRecord =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { key, source })?;
        // Hashed file names can collide; the record carries its own key
        if record.stream_key != stream_key {
            tracing::debug!(stream_key, stored = %record.stream_key, "Resume record belongs to another stream");
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn record_history(&self, entry: &ContinueWatchingEntry) -> Result<(), StoreError> {
        let _guard = self.history_lock.lock();
        let mut entries = self.read_history()?;
        entries.retain(|e| e.stream_key != entry.stream_key);
        entries.push(entry.clone());
        let bytes = serde_json::to_vec(&entries).map_err(StoreError::Encode)?;
        self.store.put(HISTORY_KEY, &bytes)
    }

    fn history(&self) -> Result<Vec<ContinueWatchingEntry>, StoreError> {
        let mut entries = self.read_history()?;
        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(entries)
    }
}
