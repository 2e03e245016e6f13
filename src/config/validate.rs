// src/config/validate.rs

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::config::model::{
    ActionConfig, AgentSection, AgentSettings, ConfigFile, RawAction, RawConfigFile,
    RawRepository, RepositoryConfig, WatchSpec, DEFAULT_ACTION_TIMEOUT, DEFAULT_AGENT_NAME,
    DEFAULT_BRANCH, DEFAULT_CACHE_DIR, DEFAULT_POLL_INTERVAL, DEFAULT_STATE_DIR,
};
use crate::errors::{Result, RevwatchError};
use crate::types::{parse_duration, LevelName};
use crate::watch::WatchSet;

/// Upper bound for poll intervals and action timeouts (one year).
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::RevwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let agent = validate_agent(&raw.agent)?;
        ensure_has_repositories(&raw)?;
        ensure_unique_names(&raw)?;

        let repositories = raw
            .repository
            .iter()
            .enumerate()
            .map(|(idx, repo)| validate_repository(idx, repo, agent.poll_interval))
            .collect::<Result<Vec<_>>>()?;

        Ok(ConfigFile::new_unchecked(agent, repositories))
    }
}

fn config_err(msg: impl Into<String>) -> RevwatchError {
    RevwatchError::ConfigError(msg.into())
}

fn validate_agent(agent: &AgentSection) -> Result<AgentSettings> {
    if let Some(level) = &agent.log_level {
        level
            .parse::<LevelName>()
            .map_err(|e| config_err(format!("[agent].log_level: {e}")))?;
    }

    let poll_interval = parse_interval(
        agent.poll_interval.as_deref().unwrap_or(DEFAULT_POLL_INTERVAL),
        "[agent].poll_interval",
    )?;

    Ok(AgentSettings {
        name: non_empty_or(agent.name.as_deref(), DEFAULT_AGENT_NAME),
        log_level: agent.log_level.clone(),
        log_file: agent
            .log_file
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from),
        state_dir: PathBuf::from(non_empty_or(agent.state_dir.as_deref(), DEFAULT_STATE_DIR)),
        cache_dir: PathBuf::from(non_empty_or(agent.cache_dir.as_deref(), DEFAULT_CACHE_DIR)),
        poll_interval,
    })
}

fn ensure_has_repositories(cfg: &RawConfigFile) -> Result<()> {
    if cfg.repository.is_empty() {
        return Err(config_err(
            "config must contain at least one [[repository]] section",
        ));
    }
    Ok(())
}

fn ensure_unique_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for repo in &cfg.repository {
        if !repo.name.is_empty() && !seen.insert(repo.name.as_str()) {
            return Err(config_err(format!(
                "repository name '{}' is used more than once",
                repo.name
            )));
        }
    }
    Ok(())
}

fn validate_repository(
    idx: usize,
    repo: &RawRepository,
    default_interval: Duration,
) -> Result<RepositoryConfig> {
    if repo.name.trim().is_empty() {
        return Err(config_err(format!("repository[{idx}]: name is required")));
    }

    // The name doubles as the working copy directory under cache_dir.
    let name_re = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$")
        .map_err(|e| config_err(format!("internal name pattern: {e}")))?;
    if !name_re.is_match(&repo.name) {
        return Err(config_err(format!(
            "repository[{idx}]: name '{}' may only contain letters, digits, '.', '_' and '-'",
            repo.name
        )));
    }

    if repo.url.trim().is_empty() {
        return Err(config_err(format!(
            "repository[{idx}] '{}': url is required",
            repo.name
        )));
    }

    let watch_paths: Vec<String> = repo
        .watch_paths
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if watch_paths.is_empty() {
        return Err(config_err(format!(
            "repository[{idx}] '{}': watch_paths is required",
            repo.name
        )));
    }

    WatchSet::new(&watch_paths).map_err(|e| {
        config_err(format!("repository[{idx}] '{}': {e:#}", repo.name))
    })?;

    let poll_interval = match &repo.poll_interval {
        Some(s) => parse_interval(s, &format!("repository[{idx}].poll_interval"))?,
        None => default_interval,
    };

    let action = validate_action(idx, &repo.name, &repo.action)?;

    Ok(RepositoryConfig {
        watch: Arc::new(WatchSpec {
            name: repo.name.clone(),
            url: repo.url.clone(),
            branch: non_empty_or(repo.branch.as_deref(), DEFAULT_BRANCH),
            watch_paths,
            poll_interval,
        }),
        action,
    })
}

fn validate_action(idx: usize, name: &str, action: &RawAction) -> Result<ActionConfig> {
    let timeout = parse_interval(
        action.timeout.as_deref().unwrap_or(DEFAULT_ACTION_TIMEOUT),
        &format!("repository[{idx}].action.timeout"),
    )?;
    let env = action.env.clone();

    match action.kind.trim().to_lowercase().as_str() {
        "" => Err(config_err(format!(
            "repository[{idx}] '{name}': action.type is required"
        ))),
        "shell" => {
            let script = action
                .script
                .clone()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    config_err(format!(
                        "repository[{idx}] '{name}': action.script is required for shell action"
                    ))
                })?;
            Ok(ActionConfig::Shell {
                script,
                timeout,
                env,
            })
        }
        "webhook" => {
            let url = action
                .url
                .clone()
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    config_err(format!(
                        "repository[{idx}] '{name}': action.url is required for webhook action"
                    ))
                })?;
            Ok(ActionConfig::Webhook { url, timeout, env })
        }
        other => Err(config_err(format!(
            "repository[{idx}] '{name}': unknown action.type '{other}' (expected \"shell\" or \"webhook\")"
        ))),
    }
}

fn parse_interval(s: &str, field: &str) -> Result<Duration> {
    let d = parse_duration(s).map_err(|e| config_err(format!("invalid {field}: {e}")))?;
    if d.is_zero() {
        return Err(config_err(format!("invalid {field}: must be greater than zero")));
    }
    if d > MAX_INTERVAL {
        return Err(config_err(format!(
            "invalid {field}: must not exceed {}h",
            MAX_INTERVAL.as_secs() / 3600
        )));
    }
    Ok(d)
}

fn non_empty_or(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}
