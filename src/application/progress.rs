//! One-way progress notifications.
//!
//! The optimizer publishes and never waits: every sink here returns
//! immediately, whatever the consumer does.

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use serde::Serialize;
use tracing::info;

/// Snapshot published after each cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Accepted moves so far
    pub iteration: usize,
    pub best_objective: f64,
    pub elapsed_seconds: f64,
    pub message: String,
}

/// Receiver of progress events. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn publish(&self, _event: ProgressEvent) {}
}

/// Logs events at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn publish(&self, event: ProgressEvent) {
        info!(
            iteration = event.iteration,
            best = event.best_objective,
            elapsed = event.elapsed_seconds,
            "{}",
            event.message
        );
    }
}

/// Bounded channel that drops the oldest event when full.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: Sender<ProgressEvent>,
    // Second handle on the queue, used only to evict the oldest event
    evict: Receiver<ProgressEvent>,
}

impl ChannelProgress {
    /// Sink plus the consumer end; `capacity` is clamped to at least 1.
    pub fn bounded(capacity: usize) -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = bounded(capacity.max(1));
        let sink = Self {
            tx,
            evict: rx.clone(),
        };
        (sink, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn publish(&self, event: ProgressEvent) {
        match self.tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => {
                let _ = self.evict.try_recv();
                let _ = self.tx.try_send(event);
            }
        }
    }
}
