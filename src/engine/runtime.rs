// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ConfigProvider;
use crate::engine::core::ControlCore;
use crate::engine::event_handlers::{fold_result, ReloadDiff};
use crate::engine::{ControlSignal, CoreCommand, LoopEvent};
use crate::exec::{ActionRequest, ActionRunner, ExecutionResult};
use crate::poll::{ChangeEvent, QueuedEvent};
use crate::shutdown::{stopped, Shutdown};
use crate::state::StateStore;
use crate::supervisor::PollerRegistry;

/// How often the loop checks whether the config file changed.
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(10);

/// Extra time granted on top of an action's own timeout before the loop
/// gives up on the runner.
pub const ACTION_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct ControlLoopOptions {
    pub maintenance_interval: Duration,
    pub action_timeout_margin: Duration,
}

impl Default for ControlLoopOptions {
    fn default() -> Self {
        Self {
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            action_timeout_margin: ACTION_TIMEOUT_MARGIN,
        }
    }
}

/// Async shell around `ControlCore`.
///
/// Selects one event at a time, feeds it to the core, and executes the
/// resulting commands before selecting again. An action run therefore
/// blocks every other source until it finishes or times out.
pub struct ControlLoop<R: ActionRunner> {
    core: ControlCore,
    provider: ConfigProvider,
    store: StateStore,
    registry: PollerRegistry,
    runner: R,
    shutdown: Shutdown,
    stop_rx: watch::Receiver<bool>,
    signal_rx: mpsc::Receiver<ControlSignal>,
    events_rx: mpsc::Receiver<QueuedEvent>,
    options: ControlLoopOptions,
}

impl<R: ActionRunner> fmt::Debug for ControlLoop<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlLoop")
            .field("core", &self.core)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<R: ActionRunner> ControlLoop<R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: ConfigProvider,
        store: StateStore,
        registry: PollerRegistry,
        runner: R,
        shutdown: Shutdown,
        signal_rx: mpsc::Receiver<ControlSignal>,
        events_rx: mpsc::Receiver<QueuedEvent>,
        options: ControlLoopOptions,
    ) -> Self {
        let stop_rx = shutdown.subscribe();
        Self {
            core: ControlCore::new(),
            provider,
            store,
            registry,
            runner,
            shutdown,
            stop_rx,
            signal_rx,
            events_rx,
            options,
        }
    }

    /// Run until the stop flag is raised or a shutdown signal arrives.
    ///
    /// Returns the config provider so the caller sees the latest reload.
    pub async fn run(mut self) -> ConfigProvider {
        info!("control loop started");

        let period = self.options.maintenance_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = if *self.stop_rx.borrow() {
                LoopEvent::Stop
            } else {
                tokio::select! {
                    biased;
                    _ = stopped(&mut self.stop_rx) => LoopEvent::Stop,
                    Some(signal) = self.signal_rx.recv() => LoopEvent::Signal(signal),
                    _ = ticker.tick() => LoopEvent::MaintenanceTick,
                    Some(queued) = self.events_rx.recv() => LoopEvent::Change(queued.into_event()),
                }
            };

            debug!(?event, "control loop received event");

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command).await;
            }

            if !step.keep_running {
                break;
            }
        }

        info!(changes = self.core.changes_seen(), "control loop exiting");
        self.provider
    }

    async fn execute_command(&mut self, command: CoreCommand) {
        match command {
            CoreCommand::BeginShutdown => {
                info!("shutdown signal received; stopping pollers");
                self.shutdown.trigger();
            }
            CoreCommand::ReloadConfig => self.reload(),
            CoreCommand::ReloadIfModified => {
                if self.provider.is_modified() {
                    info!(path = %self.provider.path().display(), "configuration changed on disk");
                    self.reload();
                }
            }
            CoreCommand::ForceCheckAll => {
                let controls = self.registry.snapshot();
                let queued = controls.iter().filter(|c| c.force_check()).count();
                info!(pollers = controls.len(), queued, "forced check requested for all repositories");
            }
            CoreCommand::RunAction(event) => self.run_action(event).await,
        }
    }

    fn reload(&mut self) {
        match self.provider.reload() {
            Ok(config) => {
                let names = self.registry.names();
                let diff = ReloadDiff::between(names.iter().map(String::as_str), &config);
                if diff.is_empty() {
                    info!(repositories = config.repositories().len(), "configuration reloaded");
                } else {
                    // Running pollers keep their original settings.
                    warn!(
                        added = ?diff.added,
                        removed = ?diff.removed,
                        "configuration reloaded; repository set changed but running pollers are not restarted"
                    );
                }
            }
            Err(err) => error!(error = %format!("{err:#}"), "configuration reload failed; keeping previous config"),
        }
    }

    async fn run_action(&mut self, event: ChangeEvent) {
        info!(repo = %event.repository, files = ?event.files, "processing change");

        let config = self.provider.current();
        let Some(request) = ActionRequest::from_event(&config, &event) else {
            warn!(repo = %event.repository, "repository no longer configured; change ignored");
            return;
        };

        let limit = request.timeout() + self.options.action_timeout_margin;
        let repository = request.repository.clone();

        let result = match tokio::time::timeout(limit, self.runner.run(request)).await {
            Ok(result) => result,
            Err(_) => ExecutionResult::failure(
                repository,
                format!("action timed out after {limit:?}"),
                limit,
            ),
        };

        fold_result(&self.store, &result);
    }
}
