//! sorastream - playback session engine for streaming clients
//!
//! Coordinates one playback at a time: periodic progress sampling, resume
//! points, the active subtitle cue and the "watch next" prompt.
//!
//! # Modules
//!
//! - `models` - Snapshots, cues, resume records
//! - `session` - Engine, clock boundary, visibility policy, timers
//! - `persist` - Key-value stores and the progress persister
//! - `appearance` - Subtitle style options
//! - `config` - Config file

pub mod appearance;
pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod persist;
pub mod session;

// Re-export commonly used types
pub use models::{
    ContinueWatchingEntry, MediaDuration, PlaybackSnapshot, ResumeRecord, SessionState,
    SubtitleCue,
};

pub use appearance::SubtitleStyle;
pub use config::Config;
pub use persist::{KvProgressPersister, ProgressPersister};
pub use session::{PlaybackEngine, PlaybackSession, SessionClock};
