use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use revwatch::errors::RevwatchError;
use revwatch::watch::{VcsFuture, VersionControl};

#[derive(Debug, Default)]
struct Repo {
    head: String,
    diffs: HashMap<(String, String), Vec<String>>,
    fail_clone: bool,
    fail_fetch: bool,
    fail_diff: bool,
    resolves: usize,
    clones: usize,
}

#[derive(Debug, Default)]
struct Shared {
    repos: HashMap<String, Repo>,
    resolve_delay: Option<Duration>,
}

/// Scripted version-control client.
///
/// Repositories are keyed by the last component of the local path, which
/// is the repository name under the cache directory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeVcs {
    shared: Arc<Mutex<Shared>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_head(&self, repo: &str, commit: &str) {
        self.with_repo(repo, |r| r.head = commit.to_string());
    }

    pub fn set_diff(&self, repo: &str, old: &str, new: &str, files: &[&str]) {
        self.with_repo(repo, |r| {
            r.diffs.insert(
                (old.to_string(), new.to_string()),
                files.iter().map(|f| f.to_string()).collect(),
            );
        });
    }

    /// Treat the working copy of `repo` as an existing, invalid repository.
    pub fn fail_clone(&self, repo: &str, fail: bool) {
        self.with_repo(repo, |r| r.fail_clone = fail);
    }

    pub fn fail_fetch(&self, repo: &str, fail: bool) {
        self.with_repo(repo, |r| r.fail_fetch = fail);
    }

    pub fn fail_diff(&self, repo: &str, fail: bool) {
        self.with_repo(repo, |r| r.fail_diff = fail);
    }

    /// Make every `resolve_ref` take this long.
    pub fn set_resolve_delay(&self, delay: Duration) {
        self.shared.lock().unwrap().resolve_delay = Some(delay);
    }

    /// How many times the head of `repo` was resolved.
    pub fn resolves(&self, repo: &str) -> usize {
        self.shared.lock().unwrap().repos.get(repo).map_or(0, |r| r.resolves)
    }

    pub fn clones(&self, repo: &str) -> usize {
        self.shared.lock().unwrap().repos.get(repo).map_or(0, |r| r.clones)
    }

    fn with_repo<T>(&self, repo: &str, f: impl FnOnce(&mut Repo) -> T) -> T {
        let mut shared = self.shared.lock().unwrap();
        f(shared.repos.entry(repo.to_string()).or_default())
    }

    fn key(local: &Path) -> String {
        local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl VersionControl for FakeVcs {
    fn ensure_clone<'a>(&'a self, local: &'a Path, _url: &'a str, _branch: &'a str) -> VcsFuture<'a, ()> {
        Box::pin(async move {
            self.with_repo(&Self::key(local), |r| {
                if r.fail_clone {
                    return Err(RevwatchError::Vcs(format!(
                        "invalid git repository at {}",
                        local.display()
                    )));
                }
                r.clones += 1;
                Ok(())
            })
        })
    }

    fn fetch<'a>(&'a self, local: &'a Path, _branch: &'a str) -> VcsFuture<'a, ()> {
        Box::pin(async move {
            if self.with_repo(&Self::key(local), |r| r.fail_fetch) {
                return Err(RevwatchError::Vcs("fetch failed: remote unreachable".to_string()));
            }
            Ok(())
        })
    }

    fn resolve_ref<'a>(&'a self, local: &'a Path, _branch: &'a str) -> VcsFuture<'a, String> {
        Box::pin(async move {
            let delay = self.shared.lock().unwrap().resolve_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let head = self.with_repo(&Self::key(local), |r| {
                r.resolves += 1;
                r.head.clone()
            });
            if head.is_empty() {
                return Err(RevwatchError::Vcs("unknown branch".to_string()));
            }
            Ok(head)
        })
    }

    fn diff_paths<'a>(&'a self, local: &'a Path, old: &'a str, new: &'a str) -> VcsFuture<'a, Vec<String>> {
        Box::pin(async move {
            self.with_repo(&Self::key(local), |r| {
                if r.fail_diff {
                    return Err(RevwatchError::Vcs(format!("bad revision '{old}..{new}'")));
                }
                Ok(r
                    .diffs
                    .get(&(old.to_string(), new.to_string()))
                    .cloned()
                    .unwrap_or_default())
            })
        })
    }
}
