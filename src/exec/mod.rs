// src/exec/mod.rs

//! Action execution layer.
//!
//! When a repository changes, the control loop hands an [`ActionRequest`]
//! to an [`ActionRunner`] and gets an [`ExecutionResult`] back.
//!
//! - [`backend`] provides the `ActionRunner` trait and the production
//!   `RealActionRunner`; tests plug in a recording fake.
//! - [`shell`] runs `type = "shell"` actions through `sh -c`.
//! - [`webhook`] POSTs a JSON payload for `type = "webhook"` actions.

pub mod backend;
pub mod shell;
pub mod webhook;

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::{ActionConfig, ConfigFile};
use crate::poll::ChangeEvent;

pub use backend::{ActionFuture, ActionRunner, RealActionRunner};

/// Prefix for the variables exported to shell actions.
pub const ENV_PREFIX: &str = "REVWATCH_";

/// Everything an action needs to know about one change.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub repository: String,
    pub url: String,
    pub local_path: PathBuf,
    pub branch: String,
    pub files: Vec<String>,
    pub old_hash: String,
    pub new_hash: String,
    pub detected_at: DateTime<Utc>,
    pub action: ActionConfig,
}

impl ActionRequest {
    /// Build the request for `event` from the current configuration.
    ///
    /// `None` when the repository is no longer configured.
    pub fn from_event(config: &ConfigFile, event: &ChangeEvent) -> Option<Self> {
        let repo = config.repository(&event.repository)?;
        Some(Self {
            repository: event.repository.clone(),
            url: repo.watch.url.clone(),
            local_path: config.local_path(&event.repository),
            branch: repo.watch.branch.clone(),
            files: event.files.clone(),
            old_hash: event.old_hash.clone(),
            new_hash: event.new_hash.clone(),
            detected_at: event.detected_at,
            action: repo.action.clone(),
        })
    }

    /// Changed files joined with commas.
    pub fn changed_files(&self) -> String {
        self.files.join(",")
    }

    pub fn timeout(&self) -> Duration {
        self.action.timeout()
    }

    /// Built-in variables followed by the action's custom ones.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            (format!("{ENV_PREFIX}REPO_NAME"), self.repository.clone()),
            (format!("{ENV_PREFIX}REPO_URL"), self.url.clone()),
            (
                format!("{ENV_PREFIX}REPO_PATH"),
                self.local_path.to_string_lossy().into_owned(),
            ),
            (format!("{ENV_PREFIX}BRANCH"), self.branch.clone()),
            (format!("{ENV_PREFIX}CHANGED_FILES"), self.changed_files()),
            (format!("{ENV_PREFIX}OLD_HASH"), self.old_hash.clone()),
            (format!("{ENV_PREFIX}NEW_HASH"), self.new_hash.clone()),
        ];
        vars.extend(
            self.action
                .env()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        vars
    }
}

/// Outcome of running one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub repository: String,
    pub success: bool,
    /// Empty on success.
    pub error: String,
    pub duration: Duration,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn success(repository: impl Into<String>, duration: Duration) -> Self {
        Self {
            repository: repository.into(),
            success: true,
            error: String::new(),
            duration,
            completed_at: Utc::now(),
        }
    }

    pub fn failure(repository: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            repository: repository.into(),
            success: false,
            error: error.into(),
            duration,
            completed_at: Utc::now(),
        }
    }
}
