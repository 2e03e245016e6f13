// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context;
use globset::{GlobBuilder, GlobMatcher};
use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile, RepositoryFile};
use crate::errors::{Result, RevwatchError};

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; includes are not expanded and
/// nothing is validated. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file, pull in `include_repositories`, and validate.
///
/// This is the recommended entry point for the rest of the application.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let mut raw_config = load_from_path(path)?;

    let base = config_dir(path);
    for pattern in raw_config.include_repositories.clone() {
        let files = resolve_include(&base, &pattern)?;
        debug!(pattern = %pattern, files = files.len(), "expanding repository include");
        for file in files {
            let included = load_repository_file(&file)?;
            raw_config.repository.extend(included.repository);
        }
    }

    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Default config location when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("revwatch.toml")
}

fn config_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn load_repository_file(path: &Path) -> Result<RepositoryFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading repository include {}", path.display()))?;
    toml::from_str(&contents).map_err(|e| {
        RevwatchError::ConfigError(format!(
            "failed to parse repository include {}: {e}",
            path.display()
        ))
    })
}

fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Expand one `include_repositories` entry into concrete files.
///
/// - A plain file is used as is.
/// - A directory contributes every `*.toml` directly inside it.
/// - Anything with glob metacharacters is matched against files under its
///   longest literal directory prefix.
///
/// Relative entries are resolved against the main config's directory.
pub fn resolve_include(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = if Path::new(pattern).is_absolute() {
        PathBuf::from(pattern)
    } else {
        base.join(pattern)
    };

    if !has_wildcards(pattern) {
        if full.is_dir() {
            let mut files: Vec<PathBuf> = fs::read_dir(&full)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
                .collect();
            files.sort();
            return Ok(files);
        }
        if full.is_file() {
            return Ok(vec![full]);
        }
        return Err(RevwatchError::ConfigError(format!(
            "include_repositories: path not found: {}",
            full.display()
        )));
    }

    let full_str = full.to_string_lossy().replace('\\', "/");
    let matcher = compile_glob(&full_str)?;
    let root = literal_prefix(&full);

    let mut files = Vec::new();
    let mut stack = vec![root];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() && matcher.is_match(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| {
            RevwatchError::ConfigError(format!("invalid include pattern '{pattern}': {e}"))
        })?;
    Ok(glob.compile_matcher())
}

/// Longest leading run of path components without glob metacharacters.
fn literal_prefix(path: &Path) -> PathBuf {
    let mut prefix = PathBuf::new();
    for component in path.components() {
        if has_wildcards(&component.as_os_str().to_string_lossy()) {
            break;
        }
        prefix.push(component);
    }
    if prefix.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        prefix
    }
}

/// What the config file looked like at the last successful load.
#[derive(Debug, Clone, Default, PartialEq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    digest: Option<blake3::Hash>,
}

impl Fingerprint {
    fn capture(path: &Path) -> Self {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok();
        let digest = fs::read(path).ok().map(|bytes| blake3::hash(&bytes));
        Self { modified, digest }
    }
}

/// Owner of the current validated configuration.
///
/// The control loop asks it to reload on SIGHUP and polls
/// [`ConfigProvider::is_modified`] on its maintenance tick.
#[derive(Debug)]
pub struct ConfigProvider {
    path: PathBuf,
    current: Arc<ConfigFile>,
    fingerprint: Fingerprint,
}

impl ConfigProvider {
    /// Load and validate the config at `path`. Fails if the initial config
    /// is unusable; later reload failures keep the previous config.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let current = Arc::new(load_and_validate(&path)?);
        let fingerprint = Fingerprint::capture(&path);
        Ok(Self {
            path,
            current,
            fingerprint,
        })
    }

    /// Wrap an already validated config that has no backing file.
    pub fn from_config(config: ConfigFile) -> Self {
        Self {
            path: PathBuf::new(),
            current: Arc::new(config),
            fingerprint: Fingerprint::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> Arc<ConfigFile> {
        Arc::clone(&self.current)
    }

    /// Re-read and re-validate. On error the previous config stays active.
    pub fn reload(&mut self) -> Result<Arc<ConfigFile>> {
        if self.path.as_os_str().is_empty() {
            return Ok(self.current());
        }
        let fresh = load_and_validate(&self.path)?;
        self.current = Arc::new(fresh);
        self.fingerprint = Fingerprint::capture(&self.path);
        debug!(path = %self.path.display(), "configuration re-read");
        Ok(self.current())
    }

    /// True when the file on disk differs from what was last loaded.
    ///
    /// The mtime is checked first; content is only hashed when the mtime
    /// moved, so touching the file without editing it is not a change.
    pub fn is_modified(&mut self) -> bool {
        if self.path.as_os_str().is_empty() {
            return false;
        }
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(m) => Some(m),
            Err(_) => return false,
        };
        if modified == self.fingerprint.modified {
            return false;
        }

        let digest = fs::read(&self.path).ok().map(|bytes| blake3::hash(&bytes));
        if digest.is_some() && digest == self.fingerprint.digest {
            self.fingerprint.modified = modified;
            return false;
        }
        true
    }
}
