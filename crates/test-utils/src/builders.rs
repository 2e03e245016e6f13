#![allow(dead_code)]

use std::path::Path;

use revwatch::config::{ConfigFile, RawAction, RawConfigFile, RawRepository};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    /// Put state and working copies under `root`.
    pub fn rooted_at(mut self, root: &Path) -> Self {
        self.config.agent.state_dir = Some(root.join("state").to_string_lossy().into_owned());
        self.config.agent.cache_dir = Some(root.join("repos").to_string_lossy().into_owned());
        self
    }

    pub fn with_poll_interval(mut self, interval: &str) -> Self {
        self.config.agent.poll_interval = Some(interval.to_string());
        self
    }

    pub fn with_repository(mut self, repo: RawRepository) -> Self {
        self.config.repository.push(repo);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RawRepository`. Defaults to a shell action running `true`.
pub struct RepositoryBuilder {
    repo: RawRepository,
}

impl RepositoryBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            repo: RawRepository {
                name: name.to_string(),
                url: format!("https://git.example.com/{name}.git"),
                action: RawAction {
                    kind: "shell".to_string(),
                    script: Some("true".to_string()),
                    ..RawAction::default()
                },
                ..RawRepository::default()
            },
        }
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        self.repo.watch_paths.push(pattern.to_string());
        self
    }

    pub fn branch(mut self, branch: &str) -> Self {
        self.repo.branch = Some(branch.to_string());
        self
    }

    pub fn poll_interval(mut self, interval: &str) -> Self {
        self.repo.poll_interval = Some(interval.to_string());
        self
    }

    pub fn shell(mut self, script: &str) -> Self {
        self.repo.action = RawAction {
            kind: "shell".to_string(),
            script: Some(script.to_string()),
            env: std::mem::take(&mut self.repo.action.env),
            timeout: self.repo.action.timeout.take(),
            ..RawAction::default()
        };
        self
    }

    pub fn webhook(mut self, url: &str) -> Self {
        self.repo.action = RawAction {
            kind: "webhook".to_string(),
            url: Some(url.to_string()),
            env: std::mem::take(&mut self.repo.action.env),
            timeout: self.repo.action.timeout.take(),
            ..RawAction::default()
        };
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.repo.action.timeout = Some(timeout.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.repo.action.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> RawRepository {
        self.repo
    }
}
