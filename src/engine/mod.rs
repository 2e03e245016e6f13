// src/engine/mod.rs

//! Control loop for revwatch.
//!
//! The loop merges four fixed sources into one serialized decision stream:
//! - the process-wide stop flag
//! - control signals (shutdown / reload / force-check-all)
//! - the periodic maintenance tick
//! - the shared change-event queue fed by every poller
//!
//! The pure decision logic lives in [`core`]; the async/IO shell that
//! reloads config, runs actions and updates state is [`runtime`]. OS signal
//! wiring is in [`signals`].

use crate::poll::ChangeEvent;

/// Out-of-band requests delivered to the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Graceful shutdown (SIGTERM / SIGINT).
    Shutdown,
    /// Re-read configuration (SIGHUP).
    Reload,
    /// Force a check of every repository (SIGUSR1).
    ForceCheckAll,
}

/// One input to the control loop, already selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// The stop flag was raised.
    Stop,
    Signal(ControlSignal),
    MaintenanceTick,
    Change(ChangeEvent),
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod signals;

pub use self::core::ControlCore;
pub use event_handlers::{fold_result, CoreCommand, CoreStep, ReloadDiff};
pub use runtime::{ControlLoop, ControlLoopOptions};
pub use signals::spawn_signal_listener;
