// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};

/// A single compiled watch pattern.
///
/// Matching rules, with `p` the pattern minus one trailing `/`:
/// - `path == p`
/// - `path` starts with `p/` (the pattern names a directory)
/// - `p` ends in `/*` and `path` starts with the directory before it
///
/// Patterns carrying other glob syntax (`*.yaml`, `deploy/**/values.yaml`,
/// `charts/{a,b}`) are matched with `globset`, where `*` does not cross
/// `/`.
#[derive(Clone)]
pub enum WatchPattern {
    Prefix(String),
    DirWildcard(String),
    Glob { raw: String, matcher: GlobMatcher },
}

impl fmt::Debug for WatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchPattern::Prefix(p) => f.debug_tuple("Prefix").field(p).finish(),
            WatchPattern::DirWildcard(d) => f.debug_tuple("DirWildcard").field(d).finish(),
            WatchPattern::Glob { raw, .. } => f.debug_tuple("Glob").field(raw).finish(),
        }
    }
}

fn has_glob_syntax(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// `path` lies strictly below directory `dir`.
fn is_under(path: &str, dir: &str) -> bool {
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

impl WatchPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim();
        let p = trimmed.strip_suffix('/').unwrap_or(trimmed);

        // "/" or "." watches the whole repository.
        if p.is_empty() || p == "." {
            return Ok(WatchPattern::Prefix(String::new()));
        }

        if let Some(dir) = p.strip_suffix("/*") {
            if !has_glob_syntax(dir) {
                return Ok(WatchPattern::DirWildcard(dir.to_string()));
            }
        }

        if has_glob_syntax(p) {
            let glob = GlobBuilder::new(p)
                .literal_separator(true)
                .build()
                .with_context(|| format!("invalid watch pattern: {pattern}"))?;
            return Ok(WatchPattern::Glob {
                raw: p.to_string(),
                matcher: glob.compile_matcher(),
            });
        }

        Ok(WatchPattern::Prefix(p.to_string()))
    }

    /// Whether a repository-relative path (forward slashes) is covered.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            WatchPattern::Prefix(p) if p.is_empty() => true,
            WatchPattern::Prefix(p) => path == p || is_under(path, p),
            WatchPattern::DirWildcard(dir) => is_under(path, dir),
            WatchPattern::Glob { raw, matcher } => {
                matcher.is_match(path) || under_glob_dir(matcher, raw, path)
            }
        }
    }
}

/// A glob may name directories too: `charts/{a,b}` covers
/// `charts/a/values.yaml`.
fn under_glob_dir(matcher: &GlobMatcher, raw: &str, path: &str) -> bool {
    if raw.ends_with("**") {
        return false;
    }
    let mut prefix = path;
    while let Some(idx) = prefix.rfind('/') {
        prefix = &prefix[..idx];
        if matcher.is_match(prefix) {
            return true;
        }
    }
    false
}

/// The ordered set of watch patterns configured for one repository.
#[derive(Debug, Clone)]
pub struct WatchSet {
    raw: Vec<String>,
    patterns: Vec<WatchPattern>,
}

impl WatchSet {
    pub fn new(raw: &[String]) -> Result<Self> {
        let patterns = raw
            .iter()
            .map(|p| WatchPattern::parse(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            raw: raw.to_vec(),
            patterns,
        })
    }

    /// The patterns exactly as configured. Reported as the change set when
    /// nothing better is known (first observation, failed diff).
    pub fn all(&self) -> Vec<String> {
        self.raw.clone()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// Keep the changed paths covered by at least one pattern, in input order.
    pub fn filter<S: AsRef<str>>(&self, changed: &[S]) -> Vec<String> {
        changed
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| self.matches(p))
            .map(str::to_string)
            .collect()
    }
}
