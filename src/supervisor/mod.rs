// src/supervisor/mod.rs

//! Agent lifecycle: start one poller per repository, run the control loop,
//! and shut everything down with a bounded grace period.

pub mod registry;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ConfigProvider;
use crate::engine::{ControlLoop, ControlLoopOptions, ControlSignal};
use crate::errors::Result;
use crate::exec::ActionRunner;
use crate::poll::{event_queue, EventEmitter, RepositoryPoller};
use crate::shutdown::Shutdown;
use crate::state::StateStore;
use crate::watch::ChangeDetector;

pub use registry::PollerRegistry;

/// Upper bound on waiting for pollers after the stop flag is raised.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Capacity of the control-signal channel.
const SIGNAL_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct AgentOptions {
    pub control: ControlLoopOptions,
    pub shutdown_grace: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            control: ControlLoopOptions::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Cloneable handle for stopping and signalling a running agent.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    shutdown: Shutdown,
    signal_tx: mpsc::Sender<ControlSignal>,
    registry: PollerRegistry,
}

impl AgentHandle {
    /// Request graceful shutdown. Safe to call any number of times.
    pub fn stop(&self) {
        if self.shutdown.trigger() {
            info!("stop requested");
        }
    }

    /// Deliver a control signal as if it came from the OS.
    pub async fn signal(&self, signal: ControlSignal) -> bool {
        self.signal_tx.send(signal).await.is_ok()
    }

    pub fn signal_sender(&self) -> mpsc::Sender<ControlSignal> {
        self.signal_tx.clone()
    }

    pub fn registry(&self) -> &PollerRegistry {
        &self.registry
    }
}

/// The watcher agent.
pub struct Agent<R: ActionRunner> {
    provider: ConfigProvider,
    store: StateStore,
    detector: ChangeDetector,
    runner: R,
    shutdown: Shutdown,
    signal_tx: mpsc::Sender<ControlSignal>,
    signal_rx: mpsc::Receiver<ControlSignal>,
    registry: PollerRegistry,
    options: AgentOptions,
}

impl<R: ActionRunner> std::fmt::Debug for Agent<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("store", &self.store)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<R: ActionRunner> Agent<R> {
    pub fn new(
        provider: ConfigProvider,
        store: StateStore,
        detector: ChangeDetector,
        runner: R,
        options: AgentOptions,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_BUFFER);
        Self {
            provider,
            store,
            detector,
            runner,
            shutdown: Shutdown::new(),
            signal_tx,
            signal_rx,
            registry: PollerRegistry::new(),
            options,
        }
    }

    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            shutdown: self.shutdown.clone(),
            signal_tx: self.signal_tx.clone(),
            registry: self.registry.clone(),
        }
    }

    /// Run until shutdown, then flush state.
    ///
    /// Pollers get `shutdown_grace` to exit; stragglers are aborted and the
    /// final flush happens regardless.
    pub async fn start(self) -> Result<()> {
        let Self {
            provider,
            store,
            detector,
            runner,
            shutdown,
            signal_tx,
            signal_rx,
            registry,
            options,
        } = self;
        drop(signal_tx);

        let config = provider.current();
        let (events_tx, events_rx) = event_queue(config.repositories().len());

        let mut pollers = Vec::with_capacity(config.repositories().len());
        for repo in config.repositories() {
            let built = RepositoryPoller::new(
                repo.watch.clone(),
                config.local_path(repo.name()),
                detector.clone(),
                store.clone(),
                EventEmitter::new(events_tx.clone()),
            )?;
            pollers.push(built);
        }
        drop(events_tx);

        let mut joins: Vec<(String, JoinHandle<()>)> = Vec::with_capacity(pollers.len());
        for (poller, control) in pollers {
            let name = poller.name().to_string();
            let handle = poller.spawn(control, shutdown.subscribe());
            registry.insert(handle.control);
            joins.push((name, handle.join));
        }

        info!(
            agent = %config.agent().name,
            repositories = joins.len(),
            "agent started"
        );
        drop(config);

        let control = ControlLoop::new(
            provider,
            store.clone(),
            registry.clone(),
            runner,
            shutdown.clone(),
            signal_rx,
            events_rx,
            options.control,
        );
        let _provider = control.run().await;

        shutdown.trigger();
        wait_for_pollers(&mut joins, options.shutdown_grace).await;
        for (name, _) in &joins {
            registry.remove(name);
        }

        if let Err(err) = store.close() {
            error!(error = %err, "failed to save state on shutdown");
            return Err(err);
        }

        info!("agent stopped");
        Ok(())
    }
}

async fn wait_for_pollers(joins: &mut [(String, JoinHandle<()>)], grace: Duration) {
    let all = async {
        for (name, join) in joins.iter_mut() {
            if let Err(err) = join.await {
                if !err.is_cancelled() {
                    warn!(repo = %name, error = %err, "poller task failed");
                }
            }
        }
    };

    if tokio::time::timeout(grace, all).await.is_err() {
        warn!(grace = ?grace, "shutdown grace exceeded; aborting remaining pollers");
        for (name, join) in joins.iter() {
            if !join.is_finished() {
                warn!(repo = %name, "aborting poller");
                join.abort();
            }
        }
    }
}
