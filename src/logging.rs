// src/logging.rs

//! Logging setup for `revwatch` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `REVWATCH_LOG` environment variable (e.g. "info", "debug")
//! 3. `[agent].log_level` from the config file
//! 4. default to `info`
//!
//! Logs go to STDERR unless `[agent].log_file` is set, in which case they
//! are appended to that file.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::fmt;

use crate::cli::LogLevel;
use crate::config::AgentSettings;
use crate::types::LevelName;

/// Environment variable consulted when no CLI level is given.
pub const LOG_ENV: &str = "REVWATCH_LOG";

/// Initialise the global logging subscriber.
///
/// Call once at startup, after the config has been loaded.
pub fn init_logging(cli_level: Option<LogLevel>, agent: &AgentSettings) -> Result<()> {
    let env_level = std::env::var(LOG_ENV).ok();
    let level = resolve_level(cli_level, env_level.as_deref(), agent.log_level.as_deref());

    let builder = fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let installed = match &agent.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

/// Pick the effective level; unparsable values fall through to the next source.
pub fn resolve_level(
    cli_level: Option<LogLevel>,
    env_level: Option<&str>,
    config_level: Option<&str>,
) -> tracing::Level {
    if let Some(lvl) = cli_level {
        return level_from_log_level(lvl);
    }

    env_level
        .and_then(|s| s.parse::<LevelName>().ok())
        .or_else(|| config_level.and_then(|s| s.parse::<LevelName>().ok()))
        .map(level_from_name)
        .unwrap_or(tracing::Level::INFO)
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn level_from_name(name: LevelName) -> tracing::Level {
    match name {
        LevelName::Error => tracing::Level::ERROR,
        LevelName::Warn => tracing::Level::WARN,
        LevelName::Info => tracing::Level::INFO,
        LevelName::Debug => tracing::Level::DEBUG,
        LevelName::Trace => tracing::Level::TRACE,
    }
}
