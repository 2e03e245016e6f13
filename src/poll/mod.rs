// src/poll/mod.rs

//! Per-repository polling.
//!
//! - [`poller`] runs the check loop for one repository.
//! - [`events`] carries change events from pollers into the control loop.

pub mod events;
pub mod poller;

pub use events::{event_queue, ChangeEvent, EmitOutcome, EventEmitter, QueuedEvent};
pub use poller::{CycleOutcome, PollerControl, PollerHandle, PollerPhase, RepositoryPoller};
