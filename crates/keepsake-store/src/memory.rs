use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::entry_cost;
use crate::error::{StoreError, StoreResult};
use crate::traits::KvStore;

struct Inner {
    entries: BTreeMap<String, String>,
    /// Sum of [`entry_cost`] over all entries.
    used: usize,
}

/// In-memory, `BTreeMap`-based key-value store.
///
/// Intended for tests, embedding, and the per-tab session store. An optional
/// quota bounds the total [`entry_cost`] of all entries; a write that would
/// exceed it is rejected and leaves the store unchanged.
pub struct InMemoryKvStore {
    inner: RwLock<Inner>,
    quota: Option<usize>,
}

impl InMemoryKvStore {
    /// Create a new empty store without a quota.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: BTreeMap::new(),
                used: 0,
            }),
            quota: None,
        }
    }

    /// Create a new empty store holding at most `quota` units.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::new()
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.entries.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Units consumed by all entries.
    pub fn used(&self) -> usize {
        self.inner.read().map(|i| i.used).unwrap_or(0)
    }

    pub fn quota(&self) -> Option<usize> {
        self.quota
    }

    /// Remove all entries.
    pub fn clear(&self) -> StoreResult<()> {
        let mut inner = self.write_lock()?;
        inner.entries.clear();
        inner.used = 0;
        Ok(())
    }

    fn write_lock(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn read_lock(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.read_lock()?.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut inner = self.write_lock()?;
        let previous = inner
            .entries
            .get(key)
            .map(|old| entry_cost(key, old))
            .unwrap_or(0);
        let needed = entry_cost(key, value);
        let used_after = inner.used - previous + needed;

        if let Some(quota) = self.quota {
            if used_after > quota {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available: quota.saturating_sub(inner.used - previous),
                });
            }
        }

        inner.entries.insert(key.to_string(), value.to_string());
        inner.used = used_after;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut inner = self.write_lock()?;
        match inner.entries.remove(key) {
            Some(old) => {
                inner.used -= entry_cost(key, &old);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.read_lock()?.entries.keys().cloned().collect())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let inner = self.read_lock()?;
        Ok(inner
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKvStore")
            .field("entry_count", &self.len())
            .field("used", &self.used())
            .field("quota", &self.quota)
            .finish()
    }
}
