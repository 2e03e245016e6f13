// src/engine/core.rs

//! Pure control-loop state machine.
//!
//! `ControlCore` consumes [`LoopEvent`]s and returns the commands the IO
//! shell (`engine::runtime::ControlLoop`) should execute. It owns no
//! channels, timers or files and is unit tested without Tokio.

use crate::engine::event_handlers::{handle_change, handle_signal, CoreCommand, CoreStep};
use crate::engine::LoopEvent;

/// Decision state for the control loop.
#[derive(Debug, Default)]
pub struct ControlCore {
    stopping: bool,
    changes_seen: u64,
}

impl ControlCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a stop or shutdown has been decided.
    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    /// Number of change events accepted so far (for tests and logs).
    pub fn changes_seen(&self) -> u64 {
        self.changes_seen
    }

    /// Handle one event and return what the shell should do.
    pub fn step(&mut self, event: LoopEvent) -> CoreStep {
        if self.stopping {
            return CoreStep::exit(Vec::new());
        }

        let step = match event {
            LoopEvent::Stop => CoreStep::exit(Vec::new()),
            LoopEvent::Signal(signal) => handle_signal(signal),
            LoopEvent::MaintenanceTick => {
                CoreStep::continue_with(vec![CoreCommand::ReloadIfModified])
            }
            LoopEvent::Change(event) => {
                self.changes_seen += 1;
                handle_change(event)
            }
        };

        if !step.keep_running {
            self.stopping = true;
        }
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ControlSignal;
    use crate::poll::ChangeEvent;
    use chrono::Utc;

    fn change(repo: &str) -> ChangeEvent {
        ChangeEvent {
            repository: repo.to_string(),
            files: vec!["src/main.rs".to_string()],
            old_hash: "a".to_string(),
            new_hash: "b".to_string(),
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn stop_ends_the_loop_without_commands() {
        let mut core = ControlCore::new();
        let step = core.step(LoopEvent::Stop);
        assert!(!step.keep_running);
        assert!(step.commands.is_empty());
        assert!(core.is_stopping());
    }

    #[test]
    fn shutdown_signal_notifies_pollers_then_exits() {
        let mut core = ControlCore::new();
        let step = core.step(LoopEvent::Signal(ControlSignal::Shutdown));
        assert!(!step.keep_running);
        assert_eq!(step.commands, vec![CoreCommand::BeginShutdown]);
    }

    #[test]
    fn tick_and_signals_map_to_commands() {
        let mut core = ControlCore::new();
        assert_eq!(
            core.step(LoopEvent::MaintenanceTick).commands,
            vec![CoreCommand::ReloadIfModified]
        );
        assert_eq!(
            core.step(LoopEvent::Signal(ControlSignal::Reload)).commands,
            vec![CoreCommand::ReloadConfig]
        );
        assert_eq!(
            core.step(LoopEvent::Signal(ControlSignal::ForceCheckAll)).commands,
            vec![CoreCommand::ForceCheckAll]
        );
        assert!(!core.is_stopping());
    }

    #[test]
    fn change_runs_action_and_counts() {
        let mut core = ControlCore::new();
        let ev = change("svc-a");
        let step = core.step(LoopEvent::Change(ev.clone()));
        assert!(step.keep_running);
        assert_eq!(step.commands, vec![CoreCommand::RunAction(ev)]);
        assert_eq!(core.changes_seen(), 1);
    }

    #[test]
    fn nothing_runs_after_stop() {
        let mut core = ControlCore::new();
        core.step(LoopEvent::Stop);
        let step = core.step(LoopEvent::Change(change("svc-a")));
        assert!(step.commands.is_empty());
        assert!(!step.keep_running);
        assert_eq!(core.changes_seen(), 0);
    }
}
