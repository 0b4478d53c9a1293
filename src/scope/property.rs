//! Per-scope string property stores.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

/// Key/value properties owned by one administrative scope.
///
/// Writes are staged by `set` and become visible to readers only once
/// `commit` succeeds. Implementations must apply a commit atomically, so a
/// `get_many` never observes half of one.
pub trait PropertyStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Reads several keys as one consistent view.
    fn get_many(&self, keys: &[&str]) -> Vec<Option<String>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    fn set(&self, key: &str, value: String);

    /// Publishes staged writes; failures are reported by the caller with the owning scope.
    fn commit(&self) -> anyhow::Result<()>;
}

/// Process-local property store.
#[derive(Debug, Default)]
pub struct InMemoryPropertyStore {
    committed: RwLock<HashMap<String, String>>,
    staged: Mutex<HashMap<String, String>>,
}

impl InMemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed properties.
    pub fn len(&self) -> usize {
        self.committed.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.read().is_empty()
    }
}

impl PropertyStore for InMemoryPropertyStore {
    fn get(&self, key: &str) -> Option<String> {
        self.committed.read().get(key).cloned()
    }

    fn get_many(&self, keys: &[&str]) -> Vec<Option<String>> {
        let committed = self.committed.read();
        keys.iter().map(|key| committed.get(*key).cloned()).collect()
    }

    fn set(&self, key: &str, value: String) {
        self.staged.lock().insert(key.to_string(), value);
    }

    fn commit(&self) -> anyhow::Result<()> {
        let staged = std::mem::take(&mut *self.staged.lock());
        if staged.is_empty() {
            return Ok(());
        }
        self.committed.write().extend(staged);
        Ok(())
    }
}
