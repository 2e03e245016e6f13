// src/poll/poller.rs

//! One poller per repository.
//!
//! Three triggers feed the same check routine: the startup check, the
//! interval timer, and forced-check requests. They are handled one at a
//! time inside a single task, so two checks for the same repository never
//! overlap.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::WatchSpec;
use crate::errors::Result;
use crate::poll::events::{ChangeEvent, EmitOutcome, EventEmitter};
use crate::shutdown::stopped;
use crate::state::StateStore;
use crate::watch::{ChangeDetector, WatchSet};

/// Where a poller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerPhase {
    Idle,
    Checking,
    Stopped,
}

/// Result of one completed check cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Remote head equals the stored watermark.
    Unchanged,
    /// The commit moved but no watched path changed. Watermark updated.
    Advanced { commit: String },
    /// Watermark updated and an event was queued.
    Emitted { commit: String, files: Vec<String> },
    /// Watermark updated but the event could not be queued.
    Dropped { commit: String, reason: EmitOutcome },
}

/// Why a check is running; only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Startup,
    Timer,
    Forced,
}

/// Cloneable control side of a running poller.
#[derive(Debug, Clone)]
pub struct PollerControl {
    name: String,
    force_tx: mpsc::Sender<()>,
    phase_rx: watch::Receiver<PollerPhase>,
}

impl PollerControl {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask for an immediate check.
    ///
    /// At most one request is remembered; asking again while one is already
    /// pending is a no-op. Returns whether this call queued a request.
    pub fn force_check(&self) -> bool {
        match self.force_tx.try_send(()) {
            Ok(()) => true,
            Err(_) => {
                debug!(repo = %self.name, "forced check already pending; coalesced");
                false
            }
        }
    }

    pub fn phase(&self) -> PollerPhase {
        *self.phase_rx.borrow()
    }
}

/// Owned handle: control plus the task to join on shutdown.
#[derive(Debug)]
pub struct PollerHandle {
    pub control: PollerControl,
    pub join: JoinHandle<()>,
}

/// Checks one repository for relevant changes.
#[derive(Debug)]
pub struct RepositoryPoller {
    spec: Arc<WatchSpec>,
    watch: WatchSet,
    local_path: PathBuf,
    detector: ChangeDetector,
    store: StateStore,
    emitter: EventEmitter,
    force_rx: mpsc::Receiver<()>,
    phase_tx: watch::Sender<PollerPhase>,
}

impl RepositoryPoller {
    /// Build a poller and its control handle without starting it.
    pub fn new(
        spec: Arc<WatchSpec>,
        local_path: PathBuf,
        detector: ChangeDetector,
        store: StateStore,
        emitter: EventEmitter,
    ) -> Result<(Self, PollerControl)> {
        let watch = WatchSet::new(&spec.watch_paths)?;
        let (force_tx, force_rx) = mpsc::channel(1);
        let (phase_tx, phase_rx) = watch::channel(PollerPhase::Idle);

        let control = PollerControl {
            name: spec.name.clone(),
            force_tx,
            phase_rx,
        };
        let poller = Self {
            spec,
            watch,
            local_path,
            detector,
            store,
            emitter,
            force_rx,
            phase_tx,
        };
        Ok((poller, control))
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Spawn the poll loop on the runtime.
    pub fn spawn(self, control: PollerControl, stop: watch::Receiver<bool>) -> PollerHandle {
        let join = tokio::spawn(self.run(stop));
        PollerHandle { control, join }
    }

    /// Poll until `stop` is raised.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        let period = self.spec.poll_interval;
        info!(repo = %self.spec.name, interval = ?period, "starting poller");

        if !*stop.borrow() {
            self.guarded_cycle(Trigger::Startup, &mut stop).await;
        }

        // The timer arms only after the startup check.
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*stop.borrow() {
            tokio::select! {
                biased;
                _ = stopped(&mut stop) => break,
                Some(()) = self.force_rx.recv() => {
                    info!(repo = %self.spec.name, "forced check requested");
                    self.guarded_cycle(Trigger::Forced, &mut stop).await;
                }
                _ = ticker.tick() => {
                    self.guarded_cycle(Trigger::Timer, &mut stop).await;
                }
            }
        }

        self.phase_tx.send_replace(PollerPhase::Stopped);
        info!(repo = %self.spec.name, "poller stopped");
    }

    /// Run one cycle, abandoning it if shutdown arrives mid-way.
    ///
    /// Abandoning is safe: the store is only touched after all version
    /// control work has finished, with no suspension point in between.
    async fn guarded_cycle(&mut self, trigger: Trigger, stop: &mut watch::Receiver<bool>) {
        let name = self.spec.name.clone();
        tokio::select! {
            biased;
            _ = stopped(stop) => {
                debug!(repo = %name, ?trigger, "check abandoned for shutdown");
            }
            res = self.check() => match res {
                Ok(outcome) => debug!(repo = %name, ?trigger, ?outcome, "check finished"),
                Err(err) => warn!(repo = %name, ?trigger, error = %err, "check failed"),
            }
        }
        self.phase_tx.send_replace(PollerPhase::Idle);
    }

    /// One poll cycle.
    ///
    /// On error nothing is written to the store and no event is emitted.
    pub async fn check(&mut self) -> Result<CycleOutcome> {
        self.phase_tx.send_replace(PollerPhase::Checking);
        let name = self.spec.name.as_str();
        debug!(repo = %name, "checking repository");

        let current = self
            .detector
            .resolve_current(&self.local_path, &self.spec)
            .await?;

        let previous = self
            .store
            .get(name)
            .map(|s| s.current_hash)
            .unwrap_or_default();

        if previous == current {
            return Ok(CycleOutcome::Unchanged);
        }

        let files = self
            .detector
            .changed_paths(&self.local_path, &self.watch, &previous, &current)
            .await;

        // No await between the watermark write and the emit.
        let now = Utc::now();
        self.store.upsert(name, |state| {
            state.current_hash = current.clone();
            state.last_fetch = Some(now);
        });

        if files.is_empty() {
            info!(
                repo = %name,
                from = %previous,
                to = %current,
                "commit moved without touching watched paths"
            );
            return Ok(CycleOutcome::Advanced { commit: current });
        }

        let event = ChangeEvent {
            repository: name.to_string(),
            files: files.clone(),
            old_hash: previous,
            new_hash: current.clone(),
            detected_at: now,
        };

        match self.emitter.try_emit(event) {
            EmitOutcome::Delivered => {
                info!(repo = %name, commit = %current, ?files, "change detected");
                Ok(CycleOutcome::Emitted {
                    commit: current,
                    files,
                })
            }
            reason => {
                warn!(
                    repo = %name,
                    commit = %current,
                    ?reason,
                    "change event dropped; previous event not yet consumed"
                );
                Ok(CycleOutcome::Dropped {
                    commit: current,
                    reason,
                })
            }
        }
    }
}
