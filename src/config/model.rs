// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [agent]
/// state_dir = "/var/lib/revwatch"
/// poll_interval = "5m"
///
/// [[repository]]
/// name = "svc-a"
/// url = "git@example.com:org/svc-a.git"
/// watch_paths = ["src/", "deploy/*"]
///
/// [repository.action]
/// type = "shell"
/// script = "./deploy.sh"
/// ```
///
/// Every section is optional at parse time; validation decides what is
/// actually required (see `config::validate`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Agent-wide settings from `[agent]`.
    #[serde(default)]
    pub agent: AgentSection,

    /// Repositories from `[[repository]]` tables.
    #[serde(default)]
    pub repository: Vec<RawRepository>,

    /// Extra files, directories or glob patterns holding more
    /// `[[repository]]` tables.
    #[serde(default)]
    pub include_repositories: Vec<String>,
}

/// `[agent]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default)]
    pub state_dir: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<String>,
    /// Default poll interval for repositories that do not set their own.
    #[serde(default)]
    pub poll_interval: Option<String>,
}

/// One `[[repository]]` table as written by the user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRepository {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub watch_paths: Vec<String>,
    #[serde(default)]
    pub poll_interval: Option<String>,
    #[serde(default)]
    pub action: RawAction,
}

/// `[repository.action]` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAction {
    /// `"shell"` or `"webhook"`.
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
    /// Custom variables handed to the action.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Shape of an included repository file: just `[[repository]]` tables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryFile {
    #[serde(default)]
    pub repository: Vec<RawRepository>,
}

pub const DEFAULT_AGENT_NAME: &str = "revwatch-agent";
pub const DEFAULT_STATE_DIR: &str = "/var/lib/revwatch";
pub const DEFAULT_CACHE_DIR: &str = "/var/lib/revwatch/repos";
pub const DEFAULT_POLL_INTERVAL: &str = "5m";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_ACTION_TIMEOUT: &str = "10m";

/// Validated agent settings with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub name: String,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub state_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub poll_interval: Duration,
}

/// What a poller watches. Immutable for the lifetime of the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    pub name: String,
    pub url: String,
    pub branch: String,
    pub watch_paths: Vec<String>,
    pub poll_interval: Duration,
}

/// Side effect to run when a repository changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionConfig {
    Shell {
        script: String,
        timeout: Duration,
        env: BTreeMap<String, String>,
    },
    Webhook {
        url: String,
        timeout: Duration,
        env: BTreeMap<String, String>,
    },
}

impl ActionConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionConfig::Shell { .. } => "shell",
            ActionConfig::Webhook { .. } => "webhook",
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            ActionConfig::Shell { timeout, .. } | ActionConfig::Webhook { timeout, .. } => *timeout,
        }
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        match self {
            ActionConfig::Shell { env, .. } | ActionConfig::Webhook { env, .. } => env,
        }
    }
}

/// A validated repository definition.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryConfig {
    pub watch: Arc<WatchSpec>,
    pub action: ActionConfig,
}

impl RepositoryConfig {
    pub fn name(&self) -> &str {
        &self.watch.name
    }
}

/// Fully validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>`, so holders can rely
/// on names being unique and every repository having watch paths and a
/// usable action.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    agent: AgentSettings,
    repositories: Vec<RepositoryConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(agent: AgentSettings, repositories: Vec<RepositoryConfig>) -> Self {
        Self {
            agent,
            repositories,
        }
    }

    pub fn agent(&self) -> &AgentSettings {
        &self.agent
    }

    pub fn repositories(&self) -> &[RepositoryConfig] {
        &self.repositories
    }

    pub fn repository(&self, name: &str) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|r| r.name() == name)
    }

    /// Local working copy location for a repository.
    pub fn local_path(&self, name: &str) -> PathBuf {
        self.agent.cache_dir.join(name)
    }
}
