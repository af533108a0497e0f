//! Debounced evaluation loop.
//!
//! A single background task owns every evaluation pass. Producers record
//! dirty components in the [`DirtyComponentStore`] and send a wake-up through
//! a bounded queue. The worker waits for the first wake-up, keeps collecting
//! for one fixed debounce span measured from that first arrival, then drains
//! the dirty store and runs one pass over everything in it.
//!
//! The dirty store is the ground truth for what to evaluate. The queue only
//! wakes the worker, so a wake-up dropped on a full queue loses nothing: the
//! next drain picks the component up, at the latest after one idle poll.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{EvaluationSettings, RuntimeConfig};
use crate::domain::ComponentId;
use crate::engine::EvaluationEngine;
use crate::storage::{DirtyComponentStore, StorageError};
use crate::utils::Clock;

/// How long `stop` waits for the worker to exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Result type for runtime loop operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised by the runtime loop.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Queue capacity must be > 0")]
    InvalidCapacity,

    #[error("Previous evaluation worker still holds the wake-up queue")]
    WorkerStillRunning,

    #[error("Dirty store error: {0}")]
    Storage(#[from] StorageError),
}

/// Timing and sizing of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// Fixed span, from the first wake-up, over which a burst is coalesced.
    pub debounce: Duration,
    /// Longest wait for a wake-up before draining the dirty store anyway.
    pub idle_poll: Duration,
    pub queue_capacity: usize,
}

impl RuntimeSettings {
    pub fn new(debounce: Duration, idle_poll: Duration, queue_capacity: usize) -> Self {
        Self {
            debounce,
            idle_poll,
            queue_capacity,
        }
    }

    pub fn from_config(evaluation: &EvaluationSettings, runtime: &RuntimeConfig) -> Self {
        Self::new(
            evaluation.debounce,
            evaluation.idle_poll,
            runtime.queue_capacity,
        )
    }
}

/// Owns the bounded wake-up queue and the evaluation worker.
pub struct EvaluationRuntimeLoop {
    engine: Arc<dyn EvaluationEngine>,
    dirty_store: Arc<dyn DirtyComponentStore>,
    clock: Arc<dyn Clock>,
    settings: RuntimeSettings,
    sender: mpsc::Sender<ComponentId>,
    // Parked here while stopped; moved into the worker while running.
    receiver: Mutex<Option<mpsc::Receiver<ComponentId>>>,
    worker: Mutex<Option<JoinHandle<mpsc::Receiver<ComponentId>>>>,
    running: AtomicBool,
    cancel: watch::Sender<bool>,
}

impl EvaluationRuntimeLoop {
    pub fn new(
        engine: Arc<dyn EvaluationEngine>,
        dirty_store: Arc<dyn DirtyComponentStore>,
        clock: Arc<dyn Clock>,
        settings: RuntimeSettings,
    ) -> Result<Self> {
        if settings.queue_capacity == 0 {
            return Err(RuntimeError::InvalidCapacity);
        }

        let (sender, receiver) = mpsc::channel(settings.queue_capacity);
        let (cancel, _) = watch::channel(false);

        Ok(Self {
            engine,
            dirty_store,
            clock,
            settings,
            sender,
            receiver: Mutex::new(Some(receiver)),
            worker: Mutex::new(None),
            running: AtomicBool::new(false),
            cancel,
        })
    }

    pub fn settings(&self) -> RuntimeSettings {
        self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the worker. A no-op while already running.
    ///
    /// Fails while a worker that missed the stop deadline is still running.
    pub async fn start(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        let Some(receiver) = self.reclaim_receiver().await else {
            error!("Evaluation loop cannot start: previous worker still running");
            self.running.store(false, Ordering::SeqCst);
            return Err(RuntimeError::WorkerStillRunning);
        };

        self.cancel.send_replace(false);
        let worker = Worker {
            engine: self.engine.clone(),
            dirty_store: self.dirty_store.clone(),
            clock: self.clock.clone(),
            settings: self.settings,
            receiver,
            cancel: self.cancel.subscribe(),
        };

        *self.worker.lock().await = Some(tokio::spawn(worker.run()));
        info!(
            debounce_ms = self.settings.debounce.as_millis() as u64,
            idle_poll_ms = self.settings.idle_poll.as_millis() as u64,
            queue_capacity = self.settings.queue_capacity,
            "Evaluation loop started"
        );
        Ok(())
    }

    /// The parked receiver, or the one a late worker has since handed back.
    async fn reclaim_receiver(&self) -> Option<mpsc::Receiver<ComponentId>> {
        if let Some(receiver) = self.receiver.lock().await.take() {
            return Some(receiver);
        }

        let mut worker = self.worker.lock().await;
        if !worker.as_ref().is_some_and(|handle| handle.is_finished()) {
            return None;
        }
        match worker.take()?.await {
            Ok(receiver) => Some(receiver),
            Err(e) => {
                error!(error = %e, "Evaluation worker panicked");
                None
            }
        }
    }

    /// Ask the worker to exit and wait briefly for it.
    ///
    /// A burst still being debounced is left in the dirty store for the next
    /// drain. A worker that misses the deadline keeps its handle here, so a
    /// later `stop` or `start` can take the queue back once it exits.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(mut handle) = self.worker.lock().await.take() else {
            return;
        };

        self.cancel.send_replace(true);
        match tokio::time::timeout(STOP_TIMEOUT, &mut handle).await {
            Ok(Ok(receiver)) => {
                *self.receiver.lock().await = Some(receiver);
                info!("Evaluation loop stopped");
            }
            Ok(Err(e)) => error!(error = %e, "Evaluation worker panicked"),
            Err(_) => {
                warn!(
                    timeout_ms = STOP_TIMEOUT.as_millis() as u64,
                    "Evaluation worker did not stop in time"
                );
                *self.worker.lock().await = Some(handle);
            }
        }
    }

    /// Whether the queue has room for another wake-up.
    pub fn can_accept(&self) -> bool {
        self.sender.capacity() > 0
    }

    /// Queued wake-ups over capacity, in `[0, 1]`.
    pub fn queue_utilization(&self) -> f64 {
        let max = self.sender.max_capacity();
        let queued = max - self.sender.capacity();
        queued as f64 / max as f64
    }

    /// Mark a component dirty and try to wake the worker.
    ///
    /// The component is always recorded in the dirty store. Returns whether
    /// the wake-up was enqueued; a full queue drops only the wake-up.
    pub async fn submit_dirty(&self, component_id: ComponentId) -> Result<bool> {
        self.mark_dirty(&component_id).await?;
        Ok(self.wake(component_id))
    }

    /// Record a component in the dirty store without waking the worker.
    pub async fn mark_dirty(&self, component_id: &ComponentId) -> Result<()> {
        self.dirty_store.mark_dirty(component_id).await?;
        Ok(())
    }

    /// Enqueue a wake-up for an already dirty component.
    pub fn wake(&self, component_id: ComponentId) -> bool {
        match self.sender.try_send(component_id) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(component = %component_id, "Wake-up queue full, relying on next drain");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// State moved into the spawned worker task.
struct Worker {
    engine: Arc<dyn EvaluationEngine>,
    dirty_store: Arc<dyn DirtyComponentStore>,
    clock: Arc<dyn Clock>,
    settings: RuntimeSettings,
    receiver: mpsc::Receiver<ComponentId>,
    cancel: watch::Receiver<bool>,
}

impl Worker {
    /// Loop until cancelled, handing the queue back on exit.
    async fn run(mut self) -> mpsc::Receiver<ComponentId> {
        loop {
            let first = tokio::select! {
                _ = self.cancel.changed() => break,
                received = tokio::time::timeout(self.settings.idle_poll, self.receiver.recv()) => received,
            };

            match first {
                Ok(Some(component_id)) => {
                    self.mark(&component_id).await;
                    if !self.coalesce().await {
                        break;
                    }
                }
                // Every sender dropped; nothing can wake us again.
                Ok(None) => break,
                // A wake-up landed as the idle poll fired; debounce it instead.
                // A producer between its mark and its send can still be drained
                // here without debounce.
                Err(_) if !self.receiver.is_empty() => continue,
                // Idle poll: fall through and drain whatever is dirty.
                Err(_) => {}
            }

            self.run_pass().await;
        }

        debug!("Evaluation worker exiting");
        self.receiver
    }

    /// Collect wake-ups until the debounce span from the first arrival ends.
    ///
    /// Returns false if cancelled meanwhile.
    async fn coalesce(&mut self) -> bool {
        let deadline = Instant::now() + self.settings.debounce;
        loop {
            let next = tokio::select! {
                _ = self.cancel.changed() => return false,
                next = tokio::time::timeout_at(deadline, self.receiver.recv()) => next,
            };

            match next {
                Ok(Some(component_id)) => self.mark(&component_id).await,
                Ok(None) | Err(_) => return true,
            }
        }
    }

    async fn mark(&self, component_id: &ComponentId) {
        if let Err(e) = self.dirty_store.mark_dirty(component_id).await {
            error!(component = %component_id, error = %e, "Failed to mark component dirty");
        }
    }

    /// Drain the dirty store and evaluate it, if anything is dirty.
    async fn run_pass(&self) {
        let dirty = match self.dirty_store.drain().await {
            Ok(dirty) => dirty,
            Err(e) => {
                error!(error = %e, "Failed to drain dirty components");
                return;
            }
        };
        if dirty.is_empty() {
            return;
        }

        let now = self.clock.now();
        match self.engine.evaluate(&dirty, now).await {
            Ok(result) => debug!(
                dirty = dirty.len(),
                opened = result.incident_transition.opened.len(),
                resolved = result.incident_transition.resolved.len(),
                "Evaluation pass finished"
            ),
            Err(e) => {
                error!(dirty = dirty.len(), error = %e, "Evaluation pass failed, retrying next cycle");
                self.restore(&dirty).await;
            }
        }
    }

    async fn restore(&self, dirty: &BTreeSet<ComponentId>) {
        for component_id in dirty {
            self.mark(component_id).await;
        }
    }
}
