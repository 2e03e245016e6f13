// src/state/model.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ActionStatus;

/// Schema version written into fresh state files.
pub const STATE_VERSION: &str = "1.0";

/// Per-repository watermark and last action outcome.
///
/// `current_hash` is the last commit observed on the remote branch; an empty
/// string means the repository has never been observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryState {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_fetch: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_hash: String,
    #[serde(default)]
    pub last_action_executed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_action_status: ActionStatus,
    #[serde(default)]
    pub last_error: String,
}

impl RepositoryState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn has_watermark(&self) -> bool {
        !self.current_hash.is_empty()
    }
}

/// Everything persisted in `state.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalState {
    #[serde(default)]
    pub version: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub repositories: HashMap<String, RepositoryState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            last_updated: Utc::now(),
            repositories: HashMap::new(),
        }
    }
}

impl GlobalState {
    pub fn repository(&self, name: &str) -> Option<&RepositoryState> {
        self.repositories.get(name)
    }
}
