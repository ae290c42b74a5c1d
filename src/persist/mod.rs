//! Progress persistence
//!
//! - Store: key-value contract with in-memory and on-disk stores
//! - Progress: resume records and the continue-watching registry
//! - Background: fire-and-forget writer used on the playback path

pub mod background;
pub mod progress;
pub mod store;

pub use background::BackgroundPersister;
pub use progress::{KvProgressPersister, ProgressPersister};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
