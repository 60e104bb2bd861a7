//! Background recorder for capture events
//!
//! The interceptor hands events to a [`Recorder`], which only enqueues them.
//! The queue is unbounded, so a burst never loses events while the worker
//! lives. A single worker task drains it into the [`EventStore`]. Insert
//! failures stop at the worker: they are logged and counted, never returned to
//! the request that produced the event.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::store::EventStore;
use crate::types::CaptureEvent;

/// Outcome counters reported when the recorder shuts down
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecorderStats {
    /// Events stored successfully
    pub recorded: u64,
    /// Events the store rejected
    pub failed: u64,
}

/// Cheap, cloneable sender side of the capture queue
#[derive(Clone)]
pub struct Recorder {
    tx: mpsc::UnboundedSender<CaptureEvent>,
}

/// Owns the worker task; await [`RecorderHandle::finish`] to flush on shutdown
pub struct RecorderHandle {
    worker: JoinHandle<RecorderStats>,
}

impl Recorder {
    /// Start the worker and return the sender plus its handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: EventStore) -> (Self, RecorderHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(store, rx));
        (Self { tx }, RecorderHandle { worker })
    }

    /// Enqueue an event without waiting.
    ///
    /// The queue is unbounded, so a burst of requests never loses events. Returns
    /// false only when the worker has already stopped.
    pub fn record(&self, event: CaptureEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                tracing::warn!(
                    method = %event.method(),
                    path = %event.path(),
                    "Capture recorder stopped, dropping event"
                );
                false
            }
        }
    }
}

async fn run_worker(
    store: EventStore,
    mut rx: mpsc::UnboundedReceiver<CaptureEvent>,
) -> RecorderStats {
    let mut stats = RecorderStats::default();

    while let Some(event) = rx.recv().await {
        match store.insert(event).await {
            Ok(stored) => {
                stats.recorded += 1;
                tracing::trace!(
                    id = stored.id().unwrap_or_default(),
                    path = %stored.path(),
                    status = stored.status_code(),
                    "Stored capture event"
                );
            }
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(error = %e, "Failed to store capture event");
            }
        }
    }

    stats
}

impl RecorderHandle {
    /// Wait for the queue to drain.
    ///
    /// Completes once every [`Recorder`] clone has been dropped and all queued
    /// events have been processed.
    pub async fn finish(self) -> RecorderStats {
        match self.worker.await {
            Ok(stats) => {
                tracing::info!(
                    recorded = stats.recorded,
                    failed = stats.failed,
                    "Capture recorder stopped"
                );
                stats
            }
            Err(e) => {
                tracing::error!(error = %e, "Capture recorder task failed");
                RecorderStats::default()
            }
        }
    }
}
