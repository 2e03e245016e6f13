// src/exec/webhook.rs

//! Webhook action runner.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::exec::ActionRequest;

/// JSON body POSTed to the webhook URL.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload<'a> {
    pub repository: &'a str,
    pub url: &'a str,
    pub branch: &'a str,
    pub files: &'a [String],
    pub old_hash: &'a str,
    pub new_hash: &'a str,
    pub detected_at: DateTime<Utc>,
    pub env: &'a BTreeMap<String, String>,
}

impl<'a> WebhookPayload<'a> {
    pub fn from_request(request: &'a ActionRequest) -> Self {
        Self {
            repository: &request.repository,
            url: &request.url,
            branch: &request.branch,
            files: &request.files,
            old_hash: &request.old_hash,
            new_hash: &request.new_hash,
            detected_at: request.detected_at,
            env: request.action.env(),
        }
    }
}

/// POST the change to `target`; any non-2xx status is an error.
pub async fn post_webhook(client: &reqwest::Client, target: &str, request: &ActionRequest) -> Result<()> {
    let payload = WebhookPayload::from_request(request);

    let resp = client
        .post(target)
        .timeout(request.timeout())
        .json(&payload)
        .send()
        .await
        .with_context(|| format!("calling webhook {target}"))?;

    let status = resp.status();
    if !status.is_success() {
        bail!("webhook {target} returned {status}");
    }

    info!(repo = %request.repository, status = %status, "webhook delivered");
    Ok(())
}
