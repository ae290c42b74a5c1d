//! Session Clock - boundary to the native playback engine
//!
//! The engine never decodes or renders; it only reads time/duration/rate
//! from a [`SessionClock`] and issues seek/play/pause/rate requests.
//! Requests are fire-and-forget: implementations must return without
//! waiting for the player to settle, and must never call back into the
//! engine synchronously (notify through [`ClockNotifier`] instead).

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::models::MediaDuration;
use crate::session::driver::EngineMessage;

/// Point-in-time reading of the native player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockReading {
    pub position: f64,
    pub duration: MediaDuration,
    pub rate: f64,
}

/// Native media-playback primitive as seen by the session engine
pub trait SessionClock: Send + Sync {
    /// Current playback position in seconds
    fn position(&self) -> f64;

    /// Raw duration in seconds; may be NaN or infinite for live streams
    fn duration(&self) -> f64;

    /// Current rate (0.0 while paused on most players)
    fn rate(&self) -> f64;

    fn seek(&self, seconds: f64);

    fn play(&self);

    fn pause(&self);

    fn set_rate(&self, rate: f64);

    /// Register the single time/item-changed callback
    fn attach(&self, notifier: ClockNotifier);

    /// Drop the registered callback; no notification fires afterwards
    fn detach(&self);

    /// Read position, duration and rate together
    fn read(&self) -> ClockReading {
        ClockReading {
            position: self.position(),
            duration: MediaDuration::from_seconds(self.duration()),
            rate: self.rate(),
        }
    }
}

/// Handle the native player uses to notify the session.
///
/// Notifications become `ClockUpdated` messages processed serially with
/// ticks. Sending after teardown is silently dropped.
#[derive(Debug, Clone)]
pub struct ClockNotifier {
    tx: mpsc::UnboundedSender<EngineMessage>,
}

impl ClockNotifier {
    pub(crate) fn new(tx: mpsc::UnboundedSender<EngineMessage>) -> Self {
        Self { tx }
    }

    /// Periodic time observation or item loaded/changed
    pub fn notify(&self) {
        let _ = self.tx.send(EngineMessage::ClockUpdated);
    }
}

// =============================================================================
// Simulated Clock
// =============================================================================

#[derive(Debug)]
struct SimState {
    position: f64,
    duration: f64,
    rate: f64,
    playing: bool,
    seeks: Vec<f64>,
    notifier: Option<ClockNotifier>,
}

/// In-memory player used by the CLI simulator and tests.
///
/// Time only moves when [`SimulatedClock::advance`] is called.
#[derive(Debug)]
pub struct SimulatedClock {
    state: Mutex<SimState>,
}

impl SimulatedClock {
    /// Create a paused clock at 0 with the given raw duration
    pub fn new(duration: f64) -> Self {
        Self {
            state: Mutex::new(SimState {
                position: 0.0,
                duration,
                rate: 1.0,
                playing: false,
                seeks: Vec::new(),
                notifier: None,
            }),
        }
    }

    /// Live stream clock (infinite duration)
    pub fn live() -> Self {
        Self::new(f64::INFINITY)
    }

    /// Move playback forward by `seconds` of wall time, scaled by rate.
    ///
    /// Position stops at the end for finite durations.
    pub fn advance(&self, seconds: f64) {
        let notifier = {
            let mut state = self.state.lock();
            if state.playing {
                let next = state.position + seconds * state.rate;
                state.position = if state.duration.is_finite() {
                    next.min(state.duration)
                } else {
                    next
                };
            }
            state.notifier.clone()
        };
        if let Some(notifier) = notifier {
            notifier.notify();
        }
    }

    /// Jump the reported position without recording a seek request
    pub fn set_position(&self, position: f64) {
        self.state.lock().position = position;
    }

    /// Change the reported duration (e.g. item finished loading)
    pub fn set_duration(&self, duration: f64) {
        let notifier = {
            let mut state = self.state.lock();
            state.duration = duration;
            state.notifier.clone()
        };
        if let Some(notifier) = notifier {
            notifier.notify();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().notifier.is_some()
    }

    /// Seek targets received so far, in order
    pub fn seek_log(&self) -> Vec<f64> {
        self.state.lock().seeks.clone()
    }
}

impl SessionClock for SimulatedClock {
    fn position(&self) -> f64 {
        self.state.lock().position
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn rate(&self) -> f64 {
        let state = self.state.lock();
        if state.playing {
            state.rate
        } else {
            0.0
        }
    }

    fn seek(&self, seconds: f64) {
        let mut state = self.state.lock();
        state.seeks.push(seconds);
        state.position = seconds;
    }

    fn play(&self) {
        self.state.lock().playing = true;
    }

    fn pause(&self) {
        self.state.lock().playing = false;
    }

    fn set_rate(&self, rate: f64) {
        let mut state = self.state.lock();
        state.rate = rate;
        // Setting a rate starts playback on most native players
        state.playing = true;
    }

    fn attach(&self, notifier: ClockNotifier) {
        self.state.lock().notifier = Some(notifier);
    }

    fn detach(&self) {
        self.state.lock().notifier = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_only_while_playing() {
        let clock = SimulatedClock::new(100.0);
        clock.advance(5.0);
        assert_eq!(clock.position(), 0.0);

        clock.play();
        clock.advance(5.0);
        assert_eq!(clock.position(), 5.0);
    }

    #[test]
    fn test_advance_scales_by_rate_and_stops_at_end() {
        let clock = SimulatedClock::new(10.0);
        clock.set_rate(2.0);
        clock.advance(3.0);
        assert_eq!(clock.position(), 6.0);
        clock.advance(3.0);
        assert_eq!(clock.position(), 10.0);
    }

    #[test]
    fn test_paused_rate_reads_zero() {
        let clock = SimulatedClock::new(10.0);
        assert_eq!(clock.rate(), 0.0);
        clock.play();
        assert_eq!(clock.rate(), 1.0);
    }

    #[test]
    fn test_read_classifies_live_duration() {
        let clock = SimulatedClock::live();
        assert_eq!(clock.read().duration, MediaDuration::Unknown);
    }

    #[test]
    fn test_seek_is_logged() {
        let clock = SimulatedClock::new(100.0);
        clock.seek(42.0);
        assert_eq!(clock.seek_log(), vec![42.0]);
        assert_eq!(clock.position(), 42.0);
    }

    #[tokio::test]
    async fn test_attach_and_detach_notifier() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let clock = SimulatedClock::new(100.0);
        clock.attach(ClockNotifier::new(tx));
        clock.play();
        clock.advance(1.0);
        assert_eq!(rx.recv().await, Some(EngineMessage::ClockUpdated));

        clock.detach();
        assert!(!clock.is_attached());
        clock.advance(1.0);
        assert!(rx.try_recv().is_err());
    }
}
