//! Fire-and-forget persistence
//!
//! Wraps a [`ProgressPersister`] so `save` returns immediately. Pending
//! writes are coalesced per stream key (last write wins), so a slow disk
//! at tick frequency never grows the queue past one record per stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::models::{ContinueWatchingEntry, ResumeRecord};
use crate::persist::progress::ProgressPersister;
use crate::persist::store::StoreError;

#[derive(Default)]
struct Queue {
    resume: HashMap<String, ResumeRecord>,
    history: HashMap<String, ContinueWatchingEntry>,
    busy: bool,
    shutdown: bool,
}

impl Queue {
    fn is_empty(&self) -> bool {
        self.resume.is_empty() && self.history.is_empty()
    }
}

struct Shared<P> {
    inner: P,
    queue: Mutex<Queue>,
    wake: Condvar,
    idle: Condvar,
}

/// Persister that writes on a dedicated worker thread
pub struct BackgroundPersister<P: ProgressPersister + 'static> {
    shared: Arc<Shared<P>>,
    worker: Option<JoinHandle<()>>,
}

impl<P: ProgressPersister + 'static> BackgroundPersister<P> {
    /// Spawn the writer thread around `inner`
    pub fn spawn(inner: P) -> Result<Self, StoreError> {
        let shared = Arc::new(Shared {
            inner,
            queue: Mutex::new(Queue::default()),
            wake: Condvar::new(),
            idle: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("sorastream-persist".to_string())
            .spawn(move || run_worker(&worker_shared))?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Block until every queued write has been attempted
    pub fn flush(&self) {
        let mut queue = self.shared.queue.lock();
        while !queue.is_empty() || queue.busy {
            self.shared.idle.wait(&mut queue);
        }
    }

    /// Number of writes waiting for the worker
    pub fn pending(&self) -> usize {
        let queue = self.shared.queue.lock();
        queue.resume.len() + queue.history.len()
    }

    pub fn inner(&self) -> &P {
        &self.shared.inner
    }
}

fn run_worker<P: ProgressPersister>(shared: &Shared<P>) {
    loop {
        let (resume, history) = {
            let mut queue = shared.queue.lock();
            while queue.is_empty() && !queue.shutdown {
                shared.wake.wait(&mut queue);
            }
            if queue.is_empty() {
                // Shutdown with nothing left to write
                return;
            }
            queue.busy = true;
            (
                std::mem::take(&mut queue.resume),
                std::mem::take(&mut queue.history),
            )
        };

        for (stream_key, record) in &resume {
            if let Err(e) = shared.inner.save(stream_key, record) {
                tracing::warn!(stream_key = %stream_key, error = %e, "failed to persist resume record");
            }
        }
        for entry in history.values() {
            if let Err(e) = shared.inner.record_history(entry) {
                tracing::warn!(stream_key = %entry.stream_key, error = %e, "failed to persist history entry");
            }
        }

        let mut queue = shared.queue.lock();
        queue.busy = false;
        if queue.is_empty() {
            shared.idle.notify_all();
        }
    }
}

impl<P: ProgressPersister + 'static> ProgressPersister for BackgroundPersister<P> {
    fn save(&self, stream_key: &str, record: &ResumeRecord) -> Result<(), StoreError> {
        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            return Err(StoreError::Unavailable("persister shut down".to_string()));
        }
        queue.resume.insert(stream_key.to_string(), record.clone());
        self.shared.wake.notify_one();
        Ok(())
    }

    fn load(&self, stream_key: &str) -> Result<Option<ResumeRecord>, StoreError> {
        if let Some(record) = self.shared.queue.lock().resume.get(stream_key) {
            return Ok(Some(record.clone()));
        }
        self.shared.inner.load(stream_key)
    }

    fn record_history(&self, entry: &ContinueWatchingEntry) -> Result<(), StoreError> {
        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            return Err(StoreError::Unavailable("persister shut down".to_string()));
        }
        queue
            .history
            .insert(entry.stream_key.clone(), entry.clone());
        self.shared.wake.notify_one();
        Ok(())
    }

    fn history(&self) -> Result<Vec<ContinueWatchingEntry>, StoreError> {
        self.flush();
        self.shared.inner.history()
    }
}

impl<P: ProgressPersister + 'static> Drop for BackgroundPersister<P> {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            self.shared.wake.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("persistence worker panicked");
            }
        }
    }
}
