// src/watch/vcs.rs

//! Version-control client abstraction.
//!
//! The change detector only needs four operations. [`GitCli`] implements
//! them by running the `git` binary; tests substitute a scripted fake.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{Result, RevwatchError};

pub type VcsFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Operations the change detector needs from a version-control client.
pub trait VersionControl: Send + Sync {
    /// Make sure `local` holds a working copy of `url`.
    ///
    /// A missing copy is cloned on `branch`. An existing directory that is
    /// not a valid repository is an error; it is never repaired.
    fn ensure_clone<'a>(&'a self, local: &'a Path, url: &'a str, branch: &'a str)
        -> VcsFuture<'a, ()>;

    /// Fetch `branch` from the remote into the working copy.
    fn fetch<'a>(&'a self, local: &'a Path, branch: &'a str) -> VcsFuture<'a, ()>;

    /// Commit id of the remote-tracking ref for `branch`.
    fn resolve_ref<'a>(&'a self, local: &'a Path, branch: &'a str) -> VcsFuture<'a, String>;

    /// Paths changed between two commits.
    fn diff_paths<'a>(&'a self, local: &'a Path, old: &'a str, new: &'a str)
        -> VcsFuture<'a, Vec<String>>;
}

/// [`VersionControl`] backed by the `git` command line client.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl GitCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run git with `args`, returning stdout on success.
    async fn run(&self, local: Option<&Path>, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        if let Some(dir) = local {
            cmd.arg("-C").arg(dir);
        }
        cmd.args(args)
            // Never block on an interactive credential prompt.
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program.display(), ?args, "running git");

        let output = cmd.output().await.map_err(|e| {
            RevwatchError::Vcs(format!("failed to spawn {}: {e}", self.program.display()))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RevwatchError::Vcs(format!(
                "git {} failed ({}): {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// `local` must be the top level of its own working copy. Git searches
    /// parent directories, so a plain directory nested inside some other
    /// checkout would otherwise pass.
    async fn check_working_copy(&self, local: &Path) -> Result<()> {
        let out = self
            .run(Some(local), &["rev-parse", "--show-toplevel"])
            .await?;
        let toplevel = tokio::fs::canonicalize(out.trim()).await?;
        let expected = tokio::fs::canonicalize(local).await?;
        if toplevel != expected {
            return Err(RevwatchError::Vcs(format!(
                "directory belongs to the working copy at {}",
                toplevel.display()
            )));
        }
        Ok(())
    }
}

impl VersionControl for GitCli {
    fn ensure_clone<'a>(
        &'a self,
        local: &'a Path,
        url: &'a str,
        branch: &'a str,
    ) -> VcsFuture<'a, ()> {
        Box::pin(async move {
            if local.exists() {
                return self.check_working_copy(local).await.map_err(|e| {
                    RevwatchError::Vcs(format!(
                        "invalid git repository at {}: {e}",
                        local.display()
                    ))
                });
            }

            if let Some(parent) = local.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let local_str = local.to_string_lossy();
            let mut args = vec!["clone"];
            if !branch.is_empty() {
                args.extend(["--branch", branch]);
            }
            args.extend([url, local_str.as_ref()]);
            self.run(None, &args).await?;

            info!(url = %url, path = %local.display(), "cloned repository");
            Ok(())
        })
    }

    fn fetch<'a>(&'a self, local: &'a Path, branch: &'a str) -> VcsFuture<'a, ()> {
        Box::pin(async move {
            self.run(Some(local), &["fetch", "origin", branch]).await?;
            Ok(())
        })
    }

    fn resolve_ref<'a>(&'a self, local: &'a Path, branch: &'a str) -> VcsFuture<'a, String> {
        Box::pin(async move {
            let reference = format!("refs/remotes/origin/{branch}");
            let out = self
                .run(Some(local), &["rev-parse", "--verify", reference.as_str()])
                .await?;
            let id = out.trim().to_string();
            if id.is_empty() {
                return Err(RevwatchError::Vcs(format!(
                    "empty commit id for {reference}"
                )));
            }
            Ok(id)
        })
    }

    fn diff_paths<'a>(
        &'a self,
        local: &'a Path,
        old: &'a str,
        new: &'a str,
    ) -> VcsFuture<'a, Vec<String>> {
        Box::pin(async move {
            let range = format!("{old}..{new}");
            let out = self
                // A rename is reported as both of its paths.
                .run(Some(local), &["diff", "--name-only", "--no-renames", range.as_str()])
                .await?;
            Ok(out
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect())
        })
    }
}
