//! Data structures and types for sorastream
//!
//! Contains all shared models used across the crate organized by domain:
//! - **Session**: playback state, durations and published snapshots
//! - **Subtitles**: timed cues consumed by the cue store
//! - **Progress**: resume records and continue-watching entries
//! - **Watch Next**: visibility decisions and auto-hide deadlines

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use tokio::time::Instant;

// =============================================================================
// Session Models
// =============================================================================

/// Duration reported by the playback clock.
///
/// Live or unseekable streams report NaN/infinite durations; those collapse
/// into [`MediaDuration::Unknown`] so fraction-based logic can be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum MediaDuration {
    /// Finite, non-negative duration in seconds
    Known(f64),
    /// Duration not (yet) known or not finite
    #[default]
    Unknown,
}

impl MediaDuration {
    /// Classify a raw duration value from the native player
    pub fn from_seconds(secs: f64) -> Self {
        if secs.is_finite() && secs >= 0.0 {
            MediaDuration::Known(secs)
        } else {
            MediaDuration::Unknown
        }
    }

    /// Seconds if the duration is known
    pub fn seconds(&self) -> Option<f64> {
        match self {
            MediaDuration::Known(secs) => Some(*secs),
            MediaDuration::Unknown => None,
        }
    }

    /// Seconds if the duration is known and strictly positive
    pub fn positive(&self) -> Option<f64> {
        self.seconds().filter(|secs| *secs > 0.0)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, MediaDuration::Known(_))
    }

    /// Clamp a position into `[0, duration]`, or just `>= 0` when unknown
    pub fn clamp_position(&self, position: f64) -> f64 {
        let position = if position.is_nan() { 0.0 } else { position.max(0.0) };
        match self {
            MediaDuration::Known(secs) => position.min(*secs),
            MediaDuration::Unknown => position,
        }
    }
}

impl From<Option<f64>> for MediaDuration {
    fn from(value: Option<f64>) -> Self {
        value.map(Self::from_seconds).unwrap_or_default()
    }
}

impl From<MediaDuration> for Option<f64> {
    fn from(value: MediaDuration) -> Self {
        value.seconds()
    }
}

impl fmt::Display for MediaDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaDuration::Known(secs) => write!(f, "{}", format_seconds(*secs)),
            MediaDuration::Unknown => write!(f, "--:--"),
        }
    }
}

/// Lifecycle of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Created, not yet started
    #[default]
    Idle,
    Playing,
    Paused,
    /// Torn down; terminal
    Ended,
}

impl SessionState {
    /// Whether ticks and user actions are still accepted
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Playing | SessionState::Paused)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Playing => write!(f, "▶ Playing"),
            SessionState::Paused => write!(f, "⏸ Paused"),
            SessionState::Ended => write!(f, "⏹ Ended"),
        }
    }
}

/// Complete view of a session, published to the presentation layer.
///
/// Always replaced as a whole; readers never see a half-updated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub state: SessionState,
    pub position_seconds: f64,
    pub duration: MediaDuration,
    pub rate: f64,
    pub is_playing: bool,
    pub active_cue_text: Option<String>,
    pub watch_next_visible: bool,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            position_seconds: 0.0,
            duration: MediaDuration::Unknown,
            rate: 1.0,
            is_playing: false,
            active_cue_text: None,
            watch_next_visible: false,
        }
    }
}

impl PlaybackSnapshot {
    /// Fraction watched, only for known positive durations
    pub fn progress_fraction(&self) -> Option<f64> {
        self.duration
            .positive()
            .map(|duration| self.position_seconds / duration)
    }

    /// Format position as HH:MM:SS or MM:SS
    pub fn format_position(&self) -> String {
        format_seconds(self.position_seconds)
    }
}

impl fmt::Display for PlaybackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} / {} @ {}x",
            self.state,
            self.format_position(),
            self.duration,
            self.rate
        )?;
        if let Some(text) = &self.active_cue_text {
            write!(f, " \"{}\"", text)?;
        }
        if self.watch_next_visible {
            write!(f, " [Watch Next]")?;
        }
        Ok(())
    }
}

/// Playback speeds offered by the speed menu
pub const SPEED_PRESETS: [f64; 8] = [0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

// =============================================================================
// Subtitle Models
// =============================================================================

/// Errors from cue construction and loading
#[derive(Debug, Error, PartialEq)]
pub enum CueError {
    #[error("Invalid cue interval: start {start} is after end {end}")]
    InvalidInterval { start: f64, end: f64 },
    #[error("Cue times must be finite")]
    NonFinite,
    #[error("Cues already loaded for this session")]
    AlreadyLoaded,
}

/// Timed subtitle line, already parsed by the cue source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCue")]
pub struct SubtitleCue {
    start_time: f64,
    end_time: f64,
    text: String,
}

#[derive(Deserialize)]
struct RawCue {
    start_time: f64,
    end_time: f64,
    text: String,
}

impl TryFrom<RawCue> for SubtitleCue {
    type Error = CueError;

    fn try_from(raw: RawCue) -> Result<Self, Self::Error> {
        SubtitleCue::new(raw.start_time, raw.end_time, raw.text)
    }
}

impl SubtitleCue {
    /// Create a cue, rejecting non-finite times and `start > end`
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Result<Self, CueError> {
        if !start_time.is_finite() || !end_time.is_finite() {
            return Err(CueError::NonFinite);
        }
        if start_time > end_time {
            return Err(CueError::InvalidInterval {
                start: start_time,
                end: end_time,
            });
        }
        Ok(Self {
            start_time,
            end_time,
            text: text.into(),
        })
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Raw cue text as supplied
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Closed-interval containment: `start <= t <= end`
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start_time && time <= self.end_time
    }

    /// Text with markup tags (`<i>`, `<font ...>`) removed
    pub fn display_text(&self) -> String {
        static TAGS: OnceLock<Option<Regex>> = OnceLock::new();
        match TAGS.get_or_init(|| Regex::new(r"<[^>]*>").ok()) {
            Some(re) => re.replace_all(&self.text, "").into_owned(),
            None => self.text.clone(),
        }
    }
}

impl fmt::Display for SubtitleCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} --> {} {}",
            format_seconds(self.start_time),
            format_seconds(self.end_time),
            self.text
        )
    }
}

// =============================================================================
// Progress Models
// =============================================================================

/// Persisted position snapshot used to resume a stream later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub stream_key: String,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub rate: f64,
}

impl ResumeRecord {
    /// Build a record from the last published snapshot.
    ///
    /// Returns `None` while the duration is unknown.
    pub fn from_snapshot(stream_key: &str, snapshot: &PlaybackSnapshot) -> Option<Self> {
        let duration = snapshot.duration.seconds()?;
        Some(Self {
            stream_key: stream_key.to_string(),
            position_seconds: snapshot.position_seconds,
            duration_seconds: duration,
            rate: snapshot.rate,
        })
    }

    /// Fraction watched (used by episode lists), only for finite positive durations
    pub fn progress_fraction(&self) -> Option<f64> {
        MediaDuration::from_seconds(self.duration_seconds)
            .positive()
            .map(|duration| (self.position_seconds / duration).clamp(0.0, 1.0))
    }

    /// Whether this record can drive a resume seek
    pub fn is_resumable(&self) -> bool {
        MediaDuration::from_seconds(self.duration_seconds)
            .positive()
            .is_some()
    }
}

impl fmt::Display for ResumeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} / {} @ {}x",
            self.stream_key,
            format_seconds(self.position_seconds),
            format_seconds(self.duration_seconds),
            self.rate
        )
    }
}

/// Entry in the "continue watching" registry, written at session end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueWatchingEntry {
    pub stream_key: String,
    pub progress: f64,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for ContinueWatchingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {:.0}% ({})",
            self.stream_key,
            self.progress * 100.0,
            self.updated_at.format("%Y-%m-%d %H:%M")
        )
    }
}

// =============================================================================
// Watch Next Models
// =============================================================================

/// Pending auto-hide callback for the watch-next prompt.
///
/// The generation distinguishes a stale timer from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoHideDeadline {
    pub generation: u64,
    pub at: Instant,
}

/// Output of the watch-next visibility policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibilityDecision {
    pub visible: bool,
    pub auto_hide_at: Option<Instant>,
}

impl VisibilityDecision {
    pub const HIDDEN: Self = Self {
        visible: false,
        auto_hide_at: None,
    };
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Format seconds as HH:MM:SS or MM:SS
pub fn format_seconds(secs: f64) -> String {
    let total_secs = if secs.is_finite() && secs > 0.0 {
        secs as u64
    } else {
        0
    };
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // MediaDuration Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_media_duration_from_seconds() {
        assert_eq!(MediaDuration::from_seconds(100.0), MediaDuration::Known(100.0));
        assert_eq!(MediaDuration::from_seconds(0.0), MediaDuration::Known(0.0));
        assert_eq!(MediaDuration::from_seconds(f64::NAN), MediaDuration::Unknown);
        assert_eq!(MediaDuration::from_seconds(f64::INFINITY), MediaDuration::Unknown);
        assert_eq!(MediaDuration::from_seconds(-1.0), MediaDuration::Unknown);
    }

    #[test]
    fn test_media_duration_positive() {
        assert_eq!(MediaDuration::Known(10.0).positive(), Some(10.0));
        assert_eq!(MediaDuration::Known(0.0).positive(), None);
        assert_eq!(MediaDuration::Unknown.positive(), None);
    }

    #[test]
    fn test_clamp_position() {
        let d = MediaDuration::Known(100.0);
        assert_eq!(d.clamp_position(-5.0), 0.0);
        assert_eq!(d.clamp_position(500.0), 100.0);
        assert_eq!(d.clamp_position(42.5), 42.5);
        assert_eq!(MediaDuration::Unknown.clamp_position(500.0), 500.0);
        assert_eq!(MediaDuration::Unknown.clamp_position(-3.0), 0.0);
        assert_eq!(MediaDuration::Unknown.clamp_position(f64::NAN), 0.0);
    }

    #[test]
    fn test_media_duration_serde() {
        let json = serde_json::to_string(&MediaDuration::Known(12.5)).unwrap();
        assert_eq!(json, "12.5");
        let json = serde_json::to_string(&MediaDuration::Unknown).unwrap();
        assert_eq!(json, "null");

        let parsed: MediaDuration = serde_json::from_str("null").unwrap();
        assert_eq!(parsed, MediaDuration::Unknown);
    }

    // -------------------------------------------------------------------------
    // Snapshot Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_snapshot_default() {
        let snapshot = PlaybackSnapshot::default();
        assert_eq!(snapshot.state, SessionState::Idle);
        assert_eq!(snapshot.rate, 1.0);
        assert!(!snapshot.watch_next_visible);
        assert!(snapshot.progress_fraction().is_none());
    }

    #[test]
    fn test_snapshot_progress_fraction() {
        let snapshot = PlaybackSnapshot {
            position_seconds: 25.0,
            duration: MediaDuration::Known(100.0),
            ..PlaybackSnapshot::default()
        };
        assert_eq!(snapshot.progress_fraction(), Some(0.25));

        let live = PlaybackSnapshot {
            position_seconds: 25.0,
            duration: MediaDuration::Unknown,
            ..PlaybackSnapshot::default()
        };
        assert!(live.progress_fraction().is_none());
    }

    #[test]
    fn test_snapshot_display() {
        let snapshot = PlaybackSnapshot {
            state: SessionState::Playing,
            position_seconds: 125.0,
            duration: MediaDuration::Known(300.0),
            rate: 1.5,
            is_playing: true,
            active_cue_text: Some("Hello".to_string()),
            watch_next_visible: true,
        };
        assert_eq!(
            snapshot.to_string(),
            "▶ Playing 02:05 / 05:00 @ 1.5x \"Hello\" [Watch Next]"
        );
    }

    #[test]
    fn test_session_state_is_active() {
        assert!(!SessionState::Idle.is_active());
        assert!(SessionState::Playing.is_active());
        assert!(SessionState::Paused.is_active());
        assert!(!SessionState::Ended.is_active());
    }

    // -------------------------------------------------------------------------
    // SubtitleCue Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_cue_rejects_inverted_interval() {
        let err = SubtitleCue::new(5.0, 3.0, "x").unwrap_err();
        assert_eq!(err, CueError::InvalidInterval { start: 5.0, end: 3.0 });
        assert_eq!(SubtitleCue::new(f64::NAN, 3.0, "x"), Err(CueError::NonFinite));
    }

    #[test]
    fn test_cue_contains_is_inclusive() {
        let cue = SubtitleCue::new(1.0, 2.0, "x").unwrap();
        assert!(cue.contains(1.0));
        assert!(cue.contains(2.0));
        assert!(!cue.contains(2.001));
        assert!(!cue.contains(0.999));
    }

    #[test]
    fn test_cue_display_text_strips_tags() {
        let cue = SubtitleCue::new(0.0, 1.0, "<i>Hello</i> <font color=\"red\">there</font>").unwrap();
        assert_eq!(cue.display_text(), "Hello there");
    }

    #[test]
    fn test_cue_deserialize_validates() {
        let ok: SubtitleCue =
            serde_json::from_str(r#"{"start_time": 1.0, "end_time": 2.0, "text": "hi"}"#).unwrap();
        assert_eq!(ok.text(), "hi");

        let bad = serde_json::from_str::<SubtitleCue>(
            r#"{"start_time": 3.0, "end_time": 2.0, "text": "hi"}"#,
        );
        assert!(bad.is_err());
    }

    // -------------------------------------------------------------------------
    // ResumeRecord Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_resume_record_progress_fraction() {
        let record = ResumeRecord {
            stream_key: "ep1".to_string(),
            position_seconds: 30.0,
            duration_seconds: 120.0,
            rate: 1.0,
        };
        assert_eq!(record.progress_fraction(), Some(0.25));
        assert!(record.is_resumable());

        let empty = ResumeRecord {
            duration_seconds: 0.0,
            ..record
        };
        assert!(empty.progress_fraction().is_none());
        assert!(!empty.is_resumable());
    }

    #[test]
    fn test_resume_record_from_snapshot_needs_duration() {
        let mut snapshot = PlaybackSnapshot {
            position_seconds: 10.0,
            ..PlaybackSnapshot::default()
        };
        assert!(ResumeRecord::from_snapshot("ep1", &snapshot).is_none());

        snapshot.duration = MediaDuration::Known(60.0);
        let record = ResumeRecord::from_snapshot("ep1", &snapshot).unwrap();
        assert_eq!(record.stream_key, "ep1");
        assert_eq!(record.position_seconds, 10.0);
        assert_eq!(record.duration_seconds, 60.0);
    }

    // -------------------------------------------------------------------------
    // Formatting Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(3661.0), "01:01:01");
        assert_eq!(format_seconds(125.9), "02:05");
        assert_eq!(format_seconds(-4.0), "00:00");
        assert_eq!(format_seconds(f64::NAN), "00:00");
    }

    #[test]
    fn test_speed_presets() {
        assert_eq!(SPEED_PRESETS.len(), 8);
        assert!(SPEED_PRESETS.contains(&1.0));
        assert!(SPEED_PRESETS.windows(2).all(|w| w[0] < w[1]));
    }
}
