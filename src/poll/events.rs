// src/poll/events.rs

//! Change events and their delivery into the control loop.
//!
//! All pollers share one bounded queue. Each poller additionally owns a
//! single delivery slot: while one of its events sits in the queue
//! unconsumed, further events from that poller are dropped. The control
//! loop frees the slot when it takes the event out of the queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A relevant change observed on one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub repository: String,
    /// Changed watched paths, never empty.
    pub files: Vec<String>,
    pub old_hash: String,
    pub new_hash: String,
    pub detected_at: DateTime<Utc>,
}

/// An event waiting in the shared queue, holding its poller's slot.
#[derive(Debug)]
pub struct QueuedEvent {
    event: ChangeEvent,
    slot: Arc<AtomicBool>,
}

impl QueuedEvent {
    pub fn repository(&self) -> &str {
        &self.event.repository
    }

    /// Take the event and free the poller's slot.
    pub fn into_event(self) -> ChangeEvent {
        self.slot.store(false, Ordering::Release);
        self.event
    }
}

/// What happened to an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Delivered,
    /// The previous event from this poller has not been consumed yet.
    SlotOccupied,
    QueueFull,
    Closed,
}

/// Per-poller sending side of the shared event queue.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::Sender<QueuedEvent>,
    slot: Arc<AtomicBool>,
}

impl EventEmitter {
    pub fn new(tx: mpsc::Sender<QueuedEvent>) -> Self {
        Self {
            tx,
            slot: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether an earlier event from this poller is still queued.
    pub fn is_pending(&self) -> bool {
        self.slot.load(Ordering::Acquire)
    }

    /// Enqueue without waiting. Never blocks the poller.
    pub fn try_emit(&self, event: ChangeEvent) -> EmitOutcome {
        if self.slot.swap(true, Ordering::AcqRel) {
            return EmitOutcome::SlotOccupied;
        }

        let queued = QueuedEvent {
            event,
            slot: Arc::clone(&self.slot),
        };
        match self.tx.try_send(queued) {
            Ok(()) => EmitOutcome::Delivered,
            Err(TrySendError::Full(rejected)) => {
                rejected.slot.store(false, Ordering::Release);
                EmitOutcome::QueueFull
            }
            Err(TrySendError::Closed(rejected)) => {
                rejected.slot.store(false, Ordering::Release);
                EmitOutcome::Closed
            }
        }
    }
}

/// Create the shared queue sized for `repositories` pollers.
///
/// With one slot per poller the queue can never be full.
pub fn event_queue(repositories: usize) -> (mpsc::Sender<QueuedEvent>, mpsc::Receiver<QueuedEvent>) {
    mpsc::channel(repositories.max(1))
}
