// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod poll;
pub mod shutdown;
pub mod state;
pub mod supervisor;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, ConfigProvider};
use crate::engine::spawn_signal_listener;
use crate::exec::RealActionRunner;
use crate::state::StateStore;
use crate::supervisor::{Agent, AgentOptions};
use crate::watch::{ChangeDetector, GitCli};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and logging
/// - the state store
/// - git-backed change detection
/// - the action runner
/// - OS signal handling
/// - the agent (pollers + control loop)
///
/// Unreadable config and an unusable state directory are fatal; nothing
/// after startup is.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let provider = ConfigProvider::open(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    let config = provider.current();

    if args.check {
        print_plan(&config);
        return Ok(());
    }

    logging::init_logging(args.log_level, config.agent())?;
    info!(
        config = %config_path.display(),
        version = env!("CARGO_PKG_VERSION"),
        "revwatch starting"
    );

    let store = StateStore::open(&config.agent().state_dir)?;
    let detector = ChangeDetector::new(Arc::new(GitCli::default()));
    let agent = Agent::new(
        provider,
        store,
        detector,
        RealActionRunner::new(),
        AgentOptions::default(),
    );

    let handle = agent.handle();
    let _signals = match spawn_signal_listener(handle.signal_sender()) {
        Ok(join) => Some(join),
        Err(e) => {
            warn!(error = %e, "failed to install signal handlers");
            None
        }
    };

    agent.start().await?;
    Ok(())
}

/// `--check` output: the validated repository plan.
fn print_plan(cfg: &ConfigFile) {
    let agent = cfg.agent();
    println!("revwatch check");
    println!("  agent.name = {}", agent.name);
    println!("  agent.state_dir = {}", agent.state_dir.display());
    println!("  agent.cache_dir = {}", agent.cache_dir.display());
    println!("  agent.poll_interval = {:?}", agent.poll_interval);
    println!();

    println!("repositories ({}):", cfg.repositories().len());
    for repo in cfg.repositories() {
        let watch = &repo.watch;
        println!("  - {}", watch.name);
        println!("      url: {}", watch.url);
        println!("      branch: {}", watch.branch);
        println!("      watch_paths: {:?}", watch.watch_paths);
        println!("      poll_interval: {:?}", watch.poll_interval);
        println!("      local_path: {}", cfg.local_path(&watch.name).display());
        println!(
            "      action: {} (timeout {:?})",
            repo.action.kind(),
            repo.action.timeout()
        );
        if !repo.action.env().is_empty() {
            let keys: Vec<_> = repo.action.env().keys().collect();
            println!("      env: {keys:?}");
        }
    }

    debug!("check complete (nothing started)");
}
