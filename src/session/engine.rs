//! Playback Session Engine
//!
//! Single source of truth for one playback. Every mutating entry point takes
//! the same lock, so periodic ticks, clock notifications and user actions
//! are applied one at a time. The published snapshot is replaced whole
//! through a `watch` channel; readers never observe a partial update.
//!
//! State machine:
//!
//! ```text
//! Idle --start--> Playing <--toggle--> Paused
//!   \                 \                  /
//!    `------------------ end ---------> Ended (terminal)
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use crate::models::{
    AutoHideDeadline, ContinueWatchingEntry, CueError, MediaDuration, PlaybackSnapshot,
    ResumeRecord, SessionState, SubtitleCue,
};
use crate::persist::ProgressPersister;
use crate::session::clock::SessionClock;
use crate::session::cues::CueStore;
use crate::session::visibility::{self, VisibilityInput};

/// Default relative skip for the forward/backward buttons
pub const DEFAULT_SKIP_SECONDS: f64 = 10.0;

/// Errors reported to callers of the engine
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Session already started")]
    AlreadyStarted,
    #[error("Session has ended")]
    Ended,
    #[error(transparent)]
    Cues(#[from] CueError),
}

/// Notable session events for the host application
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started { stream_key: String },
    /// User accepted the watch-next prompt; host should advance episodes
    WatchNextRequested { stream_key: String },
    Ended { stream_key: String },
}

/// What a tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Snapshot, cue, watch-next and resume record updated
    Updated,
    /// Duration unknown: position/rate recorded, derived state skipped
    Degraded,
    /// Session not running (idle or ended)
    Ignored,
}

/// Per-session behaviour switches
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Offer the watch-next prompt at all
    pub show_watch_next: bool,
    /// Hide the prompt again a few seconds after it appears
    pub auto_hide_watch_next: bool,
    /// Step for skip forward/backward
    pub skip_seconds: f64,
    /// Apply the resume record's rate on start
    pub restore_rate: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            show_watch_next: true,
            auto_hide_watch_next: false,
            skip_seconds: DEFAULT_SKIP_SECONDS,
            restore_rate: true,
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    stream_key: String,
    snapshot: PlaybackSnapshot,
    show_watch_next: bool,
    /// Prompt was auto-hidden; stays hidden until playback leaves the window
    dismissed: bool,
    pending_hide: Option<AutoHideDeadline>,
    next_generation: u64,
}

/// Authoritative state holder for one playback session
pub struct PlaybackEngine {
    clock: Arc<dyn SessionClock>,
    persister: Arc<dyn ProgressPersister>,
    cues: CueStore,
    settings: EngineSettings,
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
    deadline_tx: watch::Sender<Option<AutoHideDeadline>>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl PlaybackEngine {
    pub fn new(
        clock: Arc<dyn SessionClock>,
        persister: Arc<dyn ProgressPersister>,
        settings: EngineSettings,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(PlaybackSnapshot::default());
        let (deadline_tx, _) = watch::channel(None);
        let (events_tx, _) = broadcast::channel(16);

        Self {
            clock,
            persister,
            cues: CueStore::new(),
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                stream_key: String::new(),
                snapshot: PlaybackSnapshot::default(),
                show_watch_next: settings.show_watch_next,
                dismissed: false,
                pending_hide: None,
                next_generation: 0,
            }),
            settings,
            snapshot_tx,
            deadline_tx,
            events_tx,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Receive every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Receive auto-hide deadlines (`None` when nothing is pending)
    pub fn subscribe_deadlines(&self) -> watch::Receiver<Option<AutoHideDeadline>> {
        self.deadline_tx.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Last published snapshot
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    pub fn stream_key(&self) -> String {
        self.inner.lock().stream_key.clone()
    }

    pub fn pending_auto_hide(&self) -> Option<AutoHideDeadline> {
        self.inner.lock().pending_hide
    }

    pub fn clock(&self) -> &Arc<dyn SessionClock> {
        &self.clock
    }

    /// Load this session's subtitle cues (once)
    pub fn load_cues(&self, cues: Vec<SubtitleCue>) -> Result<usize, SessionError> {
        Ok(self.cues.load(cues)?)
    }

    /// Read the stored resume record, treating storage errors as "none"
    pub fn stored_resume(&self, stream_key: &str) -> Option<ResumeRecord> {
        match self.persister.load(stream_key) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(stream_key, error = %e, "failed to read resume record");
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Start playback of `stream_key`, resuming from `resume` when usable.
    ///
    /// A record with a finite positive duration triggers exactly one seek
    /// to its (clamped) position before playback begins.
    pub fn start(
        &self,
        stream_key: impl Into<String>,
        resume: Option<ResumeRecord>,
    ) -> Result<(), SessionError> {
        let stream_key = stream_key.into();
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Idle => {}
            SessionState::Ended => return Err(SessionError::Ended),
            SessionState::Playing | SessionState::Paused => {
                return Err(SessionError::AlreadyStarted)
            }
        }

        let resume = resume.filter(|record| {
            let matches = record.stream_key == stream_key;
            if !matches {
                tracing::warn!(
                    stream_key = %stream_key,
                    record_key = %record.stream_key,
                    "ignoring resume record for another stream"
                );
            }
            matches
        });

        let mut position = 0.0;
        if let Some(record) = resume.as_ref().filter(|r| r.is_resumable()) {
            position = MediaDuration::Known(record.duration_seconds)
                .clamp_position(record.position_seconds);
            self.clock.seek(position);
            tracing::info!(stream_key = %stream_key, position, "resuming playback");
        }

        let mut rate = 1.0;
        if self.settings.restore_rate {
            if let Some(saved) = resume.as_ref().map(|r| r.rate).filter(|r| is_valid_rate(*r)) {
                self.clock.set_rate(saved);
                rate = saved;
            }
        }

        self.clock.play();

        inner.state = SessionState::Playing;
        inner.stream_key = stream_key.clone();
        inner.snapshot = PlaybackSnapshot {
            state: SessionState::Playing,
            position_seconds: position,
            rate,
            is_playing: true,
            ..PlaybackSnapshot::default()
        };
        self.publish(&inner);
        drop(inner);

        tracing::info!(stream_key = %stream_key, "session started");
        let _ = self.events_tx.send(SessionEvent::Started { stream_key });
        Ok(())
    }

    /// Tear the session down, writing the final resume record.
    ///
    /// Uses the last published snapshot, never a fresh clock read. Returns
    /// `false` if the session had already ended.
    pub fn end(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Ended => return false,
            SessionState::Idle => {
                inner.state = SessionState::Ended;
                inner.snapshot.state = SessionState::Ended;
                self.publish(&inner);
                return true;
            }
            SessionState::Playing | SessionState::Paused => {}
        }

        self.set_deadline(&mut inner, None);
        let stream_key = inner.stream_key.clone();
        let last = inner.snapshot.clone();

        match ResumeRecord::from_snapshot(&stream_key, &last) {
            Some(record) => {
                self.persist(&record);
                match last.progress_fraction() {
                    Some(progress) => self.persist_history(&ContinueWatchingEntry {
                        stream_key: stream_key.clone(),
                        progress: progress.clamp(0.0, 1.0),
                        position_seconds: record.position_seconds,
                        duration_seconds: record.duration_seconds,
                        updated_at: chrono::Utc::now(),
                    }),
                    None => tracing::debug!(stream_key = %stream_key, "zero duration, no progress fraction"),
                }
            }
            None => {
                tracing::debug!(stream_key = %stream_key, "duration unknown at teardown, final record skipped")
            }
        }

        inner.state = SessionState::Ended;
        inner.snapshot = PlaybackSnapshot {
            state: SessionState::Ended,
            is_playing: false,
            watch_next_visible: false,
            ..last
        };
        self.publish(&inner);
        drop(inner);

        tracing::info!(stream_key = %stream_key, "session ended");
        let _ = self.events_tx.send(SessionEvent::Ended { stream_key });
        true
    }

    // -------------------------------------------------------------------------
    // Tick loop
    // -------------------------------------------------------------------------

    /// Periodic update at the current instant
    pub fn on_tick(&self) -> TickOutcome {
        self.on_tick_at(Instant::now())
    }

    /// Periodic update: read the clock, derive cue and watch-next state,
    /// persist the resume record and publish a new snapshot.
    pub fn on_tick_at(&self, now: Instant) -> TickOutcome {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() {
            return TickOutcome::Ignored;
        }

        let mut next = self.read_clock_into(&inner.snapshot);
        let outcome = if next.duration.is_known() {
            next.active_cue_text = self.cues.active_text(next.position_seconds);
            self.update_watch_next(&mut inner, &mut next, now);
            if let Some(record) = ResumeRecord::from_snapshot(&inner.stream_key, &next) {
                self.persist(&record);
            }
            TickOutcome::Updated
        } else {
            tracing::trace!(position = next.position_seconds, "duration unknown, derived state skipped");
            TickOutcome::Degraded
        };

        inner.snapshot = next;
        self.publish(&inner);
        outcome
    }

    /// Item loaded/changed or time observed by the native player.
    ///
    /// Refreshes position, duration and rate only; no persistence.
    pub fn on_clock_updated(&self) -> TickOutcome {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() {
            return TickOutcome::Ignored;
        }
        let next = self.read_clock_into(&inner.snapshot);
        let outcome = if next.duration.is_known() {
            TickOutcome::Updated
        } else {
            TickOutcome::Degraded
        };
        inner.snapshot = next;
        self.publish(&inner);
        outcome
    }

    /// Fire the auto-hide deadline with the given generation.
    ///
    /// Stale generations (cancelled or superseded deadlines) are ignored.
    pub fn apply_auto_hide(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() {
            return false;
        }
        match inner.pending_hide {
            Some(deadline) if deadline.generation == generation => {}
            _ => return false,
        }
        self.set_deadline(&mut inner, None);
        inner.dismissed = true;
        inner.snapshot.watch_next_visible = false;
        self.publish(&inner);
        tracing::debug!(generation, "watch-next auto-hidden");
        true
    }

    // -------------------------------------------------------------------------
    // User actions
    // -------------------------------------------------------------------------

    /// Seek, clamped into `[0, duration]`. Returns the forwarded target.
    ///
    /// The snapshot is not touched; the next tick reports the new position.
    pub fn seek(&self, to_seconds: f64) -> Option<f64> {
        let inner = self.inner.lock();
        self.seek_locked(&inner, to_seconds)
    }

    /// Skip forward by the configured step
    pub fn skip_forward(&self) -> Option<f64> {
        let inner = self.inner.lock();
        let target = inner.snapshot.position_seconds + self.settings.skip_seconds;
        self.seek_locked(&inner, target)
    }

    /// Skip backward by the configured step
    pub fn skip_backward(&self) -> Option<f64> {
        let inner = self.inner.lock();
        let target = inner.snapshot.position_seconds - self.settings.skip_seconds;
        self.seek_locked(&inner, target)
    }

    /// Change playback rate; non-positive or non-finite rates are ignored
    pub fn set_rate(&self, rate: f64) -> bool {
        if !is_valid_rate(rate) {
            tracing::debug!(rate, "ignoring invalid playback rate");
            return false;
        }
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Ended {
            return false;
        }
        self.clock.set_rate(rate);
        // Setting a rate resumes most native players; keep them paused
        if inner.state != SessionState::Playing {
            self.clock.pause();
        }
        inner.snapshot.rate = rate;
        self.publish(&inner);
        true
    }

    /// Toggle between playing and paused; returns the resulting state
    pub fn toggle_play_pause(&self) -> SessionState {
        let mut inner = self.inner.lock();
        let next = match inner.state {
            SessionState::Playing => {
                self.clock.pause();
                SessionState::Paused
            }
            SessionState::Paused => {
                self.clock.play();
                SessionState::Playing
            }
            other @ (SessionState::Idle | SessionState::Ended) => return other,
        };
        inner.state = next;
        inner.snapshot.state = next;
        inner.snapshot.is_playing = next == SessionState::Playing;
        self.publish(&inner);
        next
    }

    /// Turn the session-level watch-next flag on or off.
    ///
    /// Turning it off hides the prompt now and cancels any auto-hide timer.
    pub fn set_show_watch_next(&self, show: bool) {
        let mut inner = self.inner.lock();
        inner.show_watch_next = show;
        if !show {
            self.set_deadline(&mut inner, None);
            if inner.snapshot.watch_next_visible {
                inner.snapshot.watch_next_visible = false;
                self.publish(&inner);
            }
        }
    }

    /// User tapped "watch next": pause and notify the host
    pub fn request_watch_next(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() {
            return false;
        }
        self.clock.pause();
        inner.state = SessionState::Paused;
        inner.snapshot.state = SessionState::Paused;
        inner.snapshot.is_playing = false;
        self.publish(&inner);
        let stream_key = inner.stream_key.clone();
        drop(inner);

        tracing::info!(stream_key = %stream_key, "watch next requested");
        let _ = self
            .events_tx
            .send(SessionEvent::WatchNextRequested { stream_key });
        true
    }

    // -------------------------------------------------------------------------
    // Internals (caller holds the lock)
    // -------------------------------------------------------------------------

    fn read_clock_into(&self, previous: &PlaybackSnapshot) -> PlaybackSnapshot {
        let reading = self.clock.read();
        let mut next = previous.clone();
        next.duration = reading.duration;
        next.position_seconds = reading.duration.clamp_position(reading.position);
        // Paused players report rate 0; keep the selected rate instead
        if is_valid_rate(reading.rate) {
            next.rate = reading.rate;
        }
        next
    }

    fn update_watch_next(&self, inner: &mut Inner, next: &mut PlaybackSnapshot, now: Instant) {
        let position = next.position_seconds;
        let duration = next.duration;
        if inner.dismissed && !visibility::in_watch_next_window(position, duration) {
            inner.dismissed = false;
        }

        let decision = visibility::evaluate(VisibilityInput {
            position,
            duration,
            show_watch_next: inner.show_watch_next && !inner.dismissed,
            auto_hide: self.settings.auto_hide_watch_next,
            was_visible: inner.snapshot.watch_next_visible,
            now,
        });

        next.watch_next_visible = decision.visible;
        if !decision.visible {
            self.set_deadline(inner, None);
        } else if let Some(at) = decision.auto_hide_at {
            let generation = inner.next_generation;
            inner.next_generation += 1;
            self.set_deadline(inner, Some(AutoHideDeadline { generation, at }));
        }

        // Deadline already passed (no timer running, or it lost the race)
        if let Some(deadline) = inner.pending_hide {
            if now >= deadline.at {
                next.watch_next_visible = false;
                inner.dismissed = true;
                self.set_deadline(inner, None);
            }
        }

        if next.watch_next_visible != inner.snapshot.watch_next_visible {
            tracing::debug!(visible = next.watch_next_visible, position, "watch-next visibility changed");
        }
    }

    fn seek_locked(&self, inner: &Inner, to_seconds: f64) -> Option<f64> {
        if inner.state == SessionState::Ended {
            return None;
        }
        if to_seconds.is_nan() {
            tracing::debug!("ignoring NaN seek target");
            return None;
        }
        let duration = self.clock.read().duration;
        let target = duration.clamp_position(to_seconds);
        if target != to_seconds {
            tracing::debug!(requested = to_seconds, target, "seek target clamped");
        }
        self.clock.seek(target);
        Some(target)
    }

    fn set_deadline(&self, inner: &mut Inner, deadline: Option<AutoHideDeadline>) {
        if inner.pending_hide != deadline {
            inner.pending_hide = deadline;
            self.deadline_tx.send_replace(deadline);
        }
    }

    fn publish(&self, inner: &Inner) {
        self.snapshot_tx.send_replace(inner.snapshot.clone());
    }

    fn persist(&self, record: &ResumeRecord) {
        if let Err(e) = self.persister.save(&record.stream_key, record) {
            tracing::warn!(stream_key = %record.stream_key, error = %e, "failed to save resume record");
        }
    }

    fn persist_history(&self, entry: &ContinueWatchingEntry) {
        if let Err(e) = self.persister.record_history(entry) {
            tracing::warn!(stream_key = %entry.stream_key, error = %e, "failed to save continue-watching entry");
        }
    }
}

fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}
