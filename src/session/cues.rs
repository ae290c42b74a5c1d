//! Cue Store - subtitle lookup for one session
//!
//! Holds the parsed cue sequence exactly as supplied. Lookup is a linear
//! scan in load order so overlapping cues resolve to the earliest-loaded
//! match, regardless of start times.

use std::sync::OnceLock;

use crate::models::{CueError, SubtitleCue};

/// Load-once store of subtitle cues
#[derive(Debug, Default)]
pub struct CueStore {
    cues: OnceLock<Vec<SubtitleCue>>,
}

impl CueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with cues
    pub fn with_cues(cues: Vec<SubtitleCue>) -> Self {
        let store = Self::new();
        // A fresh OnceLock always accepts the first value
        let _ = store.cues.set(cues);
        store
    }

    /// Load the session's cues.
    ///
    /// Only the first load is accepted; later loads return
    /// [`CueError::AlreadyLoaded`] and leave the stored cues untouched.
    pub fn load(&self, cues: Vec<SubtitleCue>) -> Result<usize, CueError> {
        let count = cues.len();
        self.cues.set(cues).map_err(|_| CueError::AlreadyLoaded)?;
        tracing::debug!(count, "subtitle cues loaded");
        Ok(count)
    }

    pub fn is_loaded(&self) -> bool {
        self.cues.get().is_some()
    }

    /// Number of loaded cues (0 before loading)
    pub fn len(&self) -> usize {
        self.cues.get().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First cue, by load order, whose interval contains `time`
    pub fn active_at(&self, time: f64) -> Option<&SubtitleCue> {
        self.cues.get()?.iter().find(|cue| cue.contains(time))
    }

    /// Display text of the active cue, markup stripped.
    ///
    /// `None` means no cue is active; `Some("")` is an active cue with no text.
    pub fn active_text(&self, time: f64) -> Option<String> {
        self.active_at(time).map(SubtitleCue::display_text)
    }
}
