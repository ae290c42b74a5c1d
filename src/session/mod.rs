//! Playback session core
//!
//! - Cues: load-once subtitle lookup
//! - Clock: boundary to the native player, plus a simulated player
//! - Visibility: watch-next prompt policy
//! - Engine: authoritative session state
//! - Driver: periodic ticks and deferred callbacks on tokio

pub mod clock;
pub mod cues;
pub mod driver;
pub mod engine;
pub mod visibility;

pub use clock::{ClockNotifier, ClockReading, SessionClock, SimulatedClock};
pub use cues::CueStore;
pub use driver::{EngineMessage, PlaybackSession, DEFAULT_TICK_INTERVAL};
pub use engine::{
    EngineSettings, PlaybackEngine, SessionError, SessionEvent, TickOutcome, DEFAULT_SKIP_SECONDS,
};
