// src/engine/event_handlers.rs

//! Event handling logic for the control core, plus the result fold.

use std::collections::BTreeSet;

use tracing::{error, info};

use crate::config::ConfigFile;
use crate::engine::ControlSignal;
use crate::exec::ExecutionResult;
use crate::poll::ChangeEvent;
use crate::state::{RepositoryState, StateStore};
use crate::types::ActionStatus;

/// Command produced by the pure core, executed by the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Raise the stop flag so every poller winds down.
    BeginShutdown,
    /// Reload configuration unconditionally.
    ReloadConfig,
    /// Reload configuration only if the file changed on disk.
    ReloadIfModified,
    /// Forward a forced check to every running poller.
    ForceCheckAll,
    /// Run the configured action for this change and record the outcome.
    RunAction(ChangeEvent),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer loop should keep running after the commands.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub fn exit(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: false,
        }
    }
}

pub fn handle_signal(signal: ControlSignal) -> CoreStep {
    match signal {
        ControlSignal::Shutdown => CoreStep::exit(vec![CoreCommand::BeginShutdown]),
        ControlSignal::Reload => CoreStep::continue_with(vec![CoreCommand::ReloadConfig]),
        ControlSignal::ForceCheckAll => CoreStep::continue_with(vec![CoreCommand::ForceCheckAll]),
    }
}

pub fn handle_change(event: ChangeEvent) -> CoreStep {
    CoreStep::continue_with(vec![CoreCommand::RunAction(event)])
}

/// Record an action outcome in the store.
///
/// Only the action fields are touched; the watermark was committed when
/// the event was emitted and stays as it is.
pub fn fold_result(store: &StateStore, result: &ExecutionResult) -> RepositoryState {
    if result.success {
        info!(repo = %result.repository, "action succeeded");
    } else {
        error!(repo = %result.repository, error = %result.error, "action failed");
    }

    store.upsert(&result.repository, |state| {
        state.last_action_executed = Some(result.completed_at);
        if result.success {
            state.last_action_status = ActionStatus::Success;
            state.last_error.clear();
        } else {
            state.last_action_status = ActionStatus::Failure;
            state.last_error = if result.error.is_empty() {
                "action failed".to_string()
            } else {
                result.error.clone()
            };
        }
    })
}

/// Repositories that differ between the running pollers and a new config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl ReloadDiff {
    pub fn between<'a>(running: impl IntoIterator<Item = &'a str>, config: &ConfigFile) -> Self {
        let running: BTreeSet<&str> = running.into_iter().collect();
        let configured: BTreeSet<&str> = config.repositories().iter().map(|r| r.name()).collect();

        Self {
            added: configured
                .difference(&running)
                .map(|s| s.to_string())
                .collect(),
            removed: running
                .difference(&configured)
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
