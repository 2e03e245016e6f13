// src/state/store.rs

//! Durable, debounced state store.
//!
//! All access goes through [`StateStore::get`], [`StateStore::upsert`] and
//! [`StateStore::snapshot`]. Writers take the exclusive lock, readers share
//! it. Every `upsert` cancels the pending debounced write (if any) and
//! schedules a new one while still holding the exclusive lock, so there is
//! never more than one debounce timer alive.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{Result, RevwatchError};
use crate::state::model::{GlobalState, RepositoryState};

/// File name of the state document inside the state directory.
pub const STATE_FILE_NAME: &str = "state.json";

/// Delay between the last update and the disk write.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Guarded {
    state: GlobalState,
    pending: Option<JoinHandle<()>>,
    closed: bool,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    debounce: Duration,
    guarded: RwLock<Guarded>,
    /// Serialises file writes so an older snapshot never lands after a newer one.
    write_gate: Mutex<()>,
}

/// Shared handle to the state store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StateStore {
    inner: Arc<Inner>,
}

impl StateStore {
    /// Open (or create) the store under `state_dir` with the default debounce.
    pub fn open(state_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_debounce(state_dir, DEFAULT_DEBOUNCE)
    }

    /// Open (or create) the store under `state_dir`.
    ///
    /// Failing to create the directory is an error. A missing or unparsable
    /// state file is not: the store starts from an empty state.
    pub fn open_with_debounce(state_dir: impl AsRef<Path>, debounce: Duration) -> Result<Self> {
        let state_dir = state_dir.as_ref();
        fs::create_dir_all(state_dir).map_err(|e| {
            RevwatchError::StateError(format!(
                "failed to create state directory {}: {e}",
                state_dir.display()
            ))
        })?;

        let path = state_dir.join(STATE_FILE_NAME);
        let state = match read_state_file(&path) {
            Ok(state) => {
                info!(
                    path = %path.display(),
                    repositories = state.repositories.len(),
                    "loaded persisted state"
                );
                state
            }
            Err(err) => {
                if path.exists() {
                    warn!(path = %path.display(), error = %err, "discarding unreadable state file");
                } else {
                    debug!(path = %path.display(), "no state file yet; starting fresh");
                }
                GlobalState::default()
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                path,
                debounce,
                guarded: RwLock::new(Guarded {
                    state,
                    pending: None,
                    closed: false,
                }),
                write_gate: Mutex::new(()),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// State of one repository, if it has ever been recorded.
    pub fn get(&self, name: &str) -> Option<RepositoryState> {
        let guard = self.inner.guarded.read().unwrap_or_else(PoisonError::into_inner);
        guard.state.repositories.get(name).cloned()
    }

    /// Copy of the whole state.
    pub fn snapshot(&self) -> GlobalState {
        let guard = self.inner.guarded.read().unwrap_or_else(PoisonError::into_inner);
        guard.state.clone()
    }

    /// Create or modify a repository's state and schedule a debounced write.
    ///
    /// `update` sees the existing record or a fresh one named `name`. The
    /// name is forced back to `name` afterwards. Returns the stored record.
    pub fn upsert<F>(&self, name: &str, update: F) -> RepositoryState
    where
        F: FnOnce(&mut RepositoryState),
    {
        let mut guard = self.inner.guarded.write().unwrap_or_else(PoisonError::into_inner);

        let entry = guard
            .state
            .repositories
            .entry(name.to_string())
            .or_insert_with(|| RepositoryState::new(name));
        update(entry);
        entry.name = name.to_string();
        let stored = entry.clone();
        guard.state.last_updated = Utc::now();

        let write_through = self.schedule_save(&mut guard);
        drop(guard);

        if write_through {
            if let Err(err) = self.inner.flush() {
                warn!(error = %err, "state write failed; will retry on next update");
            }
        }
        stored
    }

    /// Cancel-and-reschedule, done under the exclusive lock held by the caller.
    ///
    /// Returns `true` when there is no runtime to host the timer and the
    /// caller must write through once it has released the lock.
    fn schedule_save(&self, guard: &mut Guarded) -> bool {
        if guard.closed {
            debug!("state store closed; update kept in memory only");
            return false;
        }
        if let Some(previous) = guard.pending.take() {
            previous.abort();
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                guard.pending = Some(handle.spawn(async move {
                    tokio::time::sleep(inner.debounce).await;
                    let written = tokio::task::spawn_blocking(move || inner.flush()).await;
                    match written {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => {
                            warn!(error = %err, "debounced state write failed; will retry on next update");
                        }
                        Err(err) => warn!(error = %err, "debounced state write task failed"),
                    }
                }));
                false
            }
            Err(_) => true,
        }
    }

    /// Write the current state to disk immediately.
    pub fn save(&self) -> Result<()> {
        self.inner.flush()
    }

    /// Cancel any pending debounced write and flush synchronously.
    ///
    /// Safe to call more than once.
    pub fn close(&self) -> Result<()> {
        {
            let mut guard = self.inner.guarded.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(pending) = guard.pending.take() {
                pending.abort();
            }
            guard.closed = true;
        }
        self.inner.flush()?;
        info!(path = %self.inner.path.display(), "state flushed");
        Ok(())
    }
}

impl Inner {
    fn flush(&self) -> Result<()> {
        let _gate = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);

        let json = {
            let guard = self.guarded.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_vec_pretty(&guard.state).context("serialising state")?
        };

        write_atomic(&self.path, &json)?;
        debug!(path = %self.path.display(), bytes = json.len(), "state written");
        Ok(())
    }
}

fn read_state_file(path: &Path) -> anyhow::Result<GlobalState> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let state = serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(state)
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} to {}", tmp.display(), path.display()))?;
    Ok(())
}
