// src/exec/backend.rs

//! Pluggable action runner abstraction.
//!
//! The control loop talks to an `ActionRunner` rather than spawning
//! processes or HTTP calls itself, so tests can swap in a fake that records
//! requests and returns canned results.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use tracing::{error, info};

use crate::config::ActionConfig;
use crate::exec::{shell, webhook, ActionRequest, ExecutionResult};

pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>>;

/// Runs the side effect configured for a repository.
///
/// Implementations must finish within `request.timeout()` and report every
/// failure, timeouts included, through the returned result.
pub trait ActionRunner: Send {
    fn run(&mut self, request: ActionRequest) -> ActionFuture<'_>;
}

/// Production runner: shell scripts and webhooks.
#[derive(Debug, Clone, Default)]
pub struct RealActionRunner {
    http: reqwest::Client,
}

impl RealActionRunner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActionRunner for RealActionRunner {
    fn run(&mut self, request: ActionRequest) -> ActionFuture<'_> {
        let http = self.http.clone();

        Box::pin(async move {
            let started = Instant::now();
            let outcome = match &request.action {
                ActionConfig::Shell { script, .. } => shell::run_shell(script, &request).await,
                ActionConfig::Webhook { url, .. } => {
                    webhook::post_webhook(&http, url, &request).await
                }
            };
            let elapsed = started.elapsed();

            match outcome {
                Ok(()) => {
                    info!(
                        repo = %request.repository,
                        kind = request.action.kind(),
                        elapsed = ?elapsed,
                        "action completed"
                    );
                    ExecutionResult::success(request.repository, elapsed)
                }
                Err(err) => {
                    error!(
                        repo = %request.repository,
                        kind = request.action.kind(),
                        error = %format!("{err:#}"),
                        "action failed"
                    );
                    ExecutionResult::failure(request.repository, format!("{err:#}"), elapsed)
                }
            }
        })
    }
}
