// src/supervisor/registry.rs

//! Registry of running pollers, keyed by repository name.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::poll::PollerControl;

/// Shared map of poller control handles. Cheap to clone.
///
/// Every access goes through the methods below; the map itself is never
/// handed out.
#[derive(Debug, Clone, Default)]
pub struct PollerRegistry {
    inner: Arc<RwLock<BTreeMap<String, PollerControl>>>,
}

impl PollerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<PollerControl> {
        self.read(|map| map.get(name).cloned())
    }

    /// Register a poller, returning the control it replaced.
    pub fn insert(&self, control: PollerControl) -> Option<PollerControl> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(control.name().to_string(), control)
    }

    pub fn remove(&self, name: &str) -> Option<PollerControl> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(name)
    }

    /// Controls of every registered poller, ordered by name.
    pub fn snapshot(&self) -> Vec<PollerControl> {
        self.read(|map| map.values().cloned().collect())
    }

    pub fn names(&self) -> Vec<String> {
        self.read(|map| map.keys().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.read(BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(&self, f: impl FnOnce(&BTreeMap<String, PollerControl>) -> T) -> T {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&map)
    }
}
