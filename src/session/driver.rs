//! Session driver - timers and message loop around the engine
//!
//! Three tokio tasks per session:
//! - ticker: sends `Tick` every interval
//! - auto-hide: sleeps until the engine's pending deadline, then sends
//!   `AutoHide`; dropped and re-armed whenever the deadline changes
//! - worker: applies messages to the engine one at a time
//!
//! The native clock notifies through the same channel (`ClockUpdated`), so
//! every inbound message is processed serially regardless of its origin.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::models::{AutoHideDeadline, PlaybackSnapshot, SessionState};
use crate::session::clock::ClockNotifier;
use crate::session::engine::{PlaybackEngine, SessionError};

/// Nominal tick interval
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Inbound messages, processed strictly in arrival order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMessage {
    /// Periodic scheduler fired
    Tick,
    /// Native player observed time or loaded a new item
    ClockUpdated,
    /// Auto-hide deadline with this generation elapsed
    AutoHide { generation: u64 },
}

struct SessionTasks {
    ticker: JoinHandle<()>,
    auto_hide: JoinHandle<()>,
    worker: JoinHandle<()>,
}

struct SessionShared {
    engine: Arc<PlaybackEngine>,
    tasks: Mutex<Option<SessionTasks>>,
}

impl SessionShared {
    /// Stop timers, detach the clock and end the engine; first call wins
    fn stop(&self) -> bool {
        let Some(tasks) = self.tasks.lock().take() else {
            return false;
        };
        tasks.ticker.abort();
        tasks.auto_hide.abort();

        let clock = self.engine.clock();
        clock.detach();
        clock.pause();

        tasks.worker.abort();
        self.engine.end();
        true
    }
}

/// A running playback session.
///
/// Dropping the session ends it. Ending the engine directly also stops the
/// session's timers.
pub struct PlaybackSession {
    shared: Arc<SessionShared>,
}

impl PlaybackSession {
    /// Start `stream_key` on `engine`, resuming from the stored record.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        engine: Arc<PlaybackEngine>,
        stream_key: &str,
        interval: Duration,
    ) -> Result<Self, SessionError> {
        let resume = engine.stored_resume(stream_key);
        engine.start(stream_key, resume)?;
        Ok(Self::attach(engine, interval))
    }

    /// Drive an engine the caller already started
    pub fn attach(engine: Arc<PlaybackEngine>, interval: Duration) -> Self {
        let shared = Arc::new(SessionShared {
            engine: Arc::clone(&engine),
            tasks: Mutex::new(None),
        });

        // Held while spawning so an early end in the worker sees the tasks
        let mut slot = shared.tasks.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        engine.clock().attach(ClockNotifier::new(tx.clone()));

        let worker = tokio::spawn(run_worker(
            Arc::clone(&engine),
            rx,
            Arc::downgrade(&shared),
        ));
        let auto_hide = tokio::spawn(run_auto_hide(engine.subscribe_deadlines(), tx.clone()));
        let ticker = tokio::spawn(run_ticker(tx, interval));
        *slot = Some(SessionTasks {
            ticker,
            auto_hide,
            worker,
        });
        drop(slot);

        Self { shared }
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.shared.engine
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.shared.engine.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.shared.tasks.lock().is_some()
    }

    /// Stop timers, detach the clock and end the engine.
    ///
    /// Idempotent: only the first call does anything and returns `true`.
    /// Ticks already in flight are ignored by the ended engine.
    pub fn end(&self) -> bool {
        self.shared.stop()
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

async fn run_worker(
    engine: Arc<PlaybackEngine>,
    mut rx: mpsc::UnboundedReceiver<EngineMessage>,
    session: Weak<SessionShared>,
) {
    let mut snapshots = engine.subscribe();
    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(EngineMessage::Tick) => {
                    engine.on_tick();
                }
                Some(EngineMessage::ClockUpdated) => {
                    engine.on_clock_updated();
                }
                Some(EngineMessage::AutoHide { generation }) => {
                    engine.apply_auto_hide(generation);
                }
                None => return,
            },
            ended = wait_for_end(&mut snapshots) => {
                if ended {
                    if let Some(session) = session.upgrade() {
                        if session.stop() {
                            tracing::debug!(stream_key = %engine.stream_key(), "engine ended directly, session stopped");
                        }
                    }
                }
                return;
            }
        }
    }
}

async fn wait_for_end(snapshots: &mut watch::Receiver<PlaybackSnapshot>) -> bool {
    snapshots
        .wait_for(|s| s.state == SessionState::Ended)
        .await
        .is_ok()
}

async fn run_ticker(tx: mpsc::UnboundedSender<EngineMessage>, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if tx.send(EngineMessage::Tick).is_err() {
            break;
        }
    }
}

/// One-shot timer per deadline; a changed deadline drops the pending sleep
async fn run_auto_hide(
    mut deadlines: watch::Receiver<Option<AutoHideDeadline>>,
    tx: mpsc::UnboundedSender<EngineMessage>,
) {
    loop {
        let current = *deadlines.borrow_and_update();
        match current {
            Some(deadline) => {
                let fired = tokio::select! {
                    _ = tokio::time::sleep_until(deadline.at) => true,
                    changed = deadlines.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        false
                    }
                };
                if fired {
                    let message = EngineMessage::AutoHide {
                        generation: deadline.generation,
                    };
                    if tx.send(message).is_err() || deadlines.changed().await.is_err() {
                        return;
                    }
                }
            }
            None => {
                if deadlines.changed().await.is_err() {
                    return;
                }
            }
        }
    }
}
