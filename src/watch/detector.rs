// src/watch/detector.rs

//! Commit-level change detection for a single repository.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::WatchSpec;
use crate::errors::Result;
use crate::watch::patterns::WatchSet;
use crate::watch::vcs::VersionControl;

/// Result of comparing the remote branch against a previous commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Commit the remote branch points at now.
    pub current: String,
    /// Watched paths changed since the previous commit. Empty when the
    /// commit did not move or nothing watched was touched.
    pub changed: Vec<String>,
}

/// Resolves the latest remote commit and the watched paths it touched.
#[derive(Clone)]
pub struct ChangeDetector {
    vcs: Arc<dyn VersionControl>,
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector").finish_non_exhaustive()
    }
}

impl ChangeDetector {
    pub fn new(vcs: Arc<dyn VersionControl>) -> Self {
        Self { vcs }
    }

    /// Clone if needed, fetch, and read `origin/<branch>`.
    ///
    /// Any failure here aborts the poll cycle.
    pub async fn resolve_current(&self, local: &Path, spec: &WatchSpec) -> Result<String> {
        self.vcs.ensure_clone(local, &spec.url, &spec.branch).await?;
        self.vcs.fetch(local, &spec.branch).await?;
        let current = self.vcs.resolve_ref(local, &spec.branch).await?;
        debug!(repo = %spec.name, commit = %current, "resolved remote head");
        Ok(current)
    }

    /// Watched paths changed between `previous` and `current`.
    ///
    /// An empty `previous` means the repository was never observed, so every
    /// pattern counts as changed. A diff that cannot be computed degrades to
    /// the same answer instead of failing.
    pub async fn changed_paths(
        &self,
        local: &Path,
        watch: &WatchSet,
        previous: &str,
        current: &str,
    ) -> Vec<String> {
        if previous.is_empty() {
            return watch.all();
        }
        if previous == current {
            return Vec::new();
        }

        match self.vcs.diff_paths(local, previous, current).await {
            Ok(paths) => {
                let filtered = watch.filter(&paths);
                debug!(
                    total = paths.len(),
                    watched = filtered.len(),
                    "filtered diff against watch patterns"
                );
                filtered
            }
            Err(err) => {
                warn!(
                    from = %previous,
                    to = %current,
                    error = %err,
                    "could not compute diff; assuming all watched paths changed"
                );
                watch.all()
            }
        }
    }

    /// Full detection: resolve the remote head, then diff against `previous`.
    pub async fn detect(
        &self,
        local: &Path,
        spec: &WatchSpec,
        watch: &WatchSet,
        previous: &str,
    ) -> Result<Detection> {
        let current = self.resolve_current(local, spec).await?;
        let changed = self.changed_paths(local, watch, previous, &current).await;
        Ok(Detection { current, changed })
    }
}
