// src/exec/shell.rs

//! Shell action runner.

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::exec::ActionRequest;

/// Run `script` with `sh -c`, bounded by the action timeout.
///
/// The working copy is the working directory when it exists. On timeout
/// the child is killed (dropping it with `kill_on_drop`) and an error is
/// returned. A non-zero exit returns an error carrying stdout and stderr.
pub async fn run_shell(script: &str, request: &ActionRequest) -> Result<()> {
    let timeout = request.timeout();

    info!(
        repo = %request.repository,
        commit = %request.new_hash,
        script = %script,
        "starting shell action"
    );

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(script);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(script);
        c
    };

    if request.local_path.is_dir() {
        cmd.current_dir(&request.local_path);
    }
    cmd.envs(request.env_vars())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .with_context(|| format!("spawning shell action for '{}'", request.repository))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(res) => res.with_context(|| {
            format!("waiting for shell action of '{}'", request.repository)
        })?,
        Err(_) => bail!("shell action timed out after {:?}", timeout),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        bail!(
            "shell command failed: {}\nstdout: {}\nstderr: {}",
            output.status,
            stdout.trim(),
            stderr.trim()
        );
    }

    if !stdout.trim().is_empty() {
        debug!(repo = %request.repository, "stdout: {}", stdout.trim());
    }
    if !stderr.trim().is_empty() {
        warn!(repo = %request.repository, "shell action stderr: {}", stderr.trim());
    }

    Ok(())
}
