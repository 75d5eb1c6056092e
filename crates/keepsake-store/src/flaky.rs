//! A store wrapper that rejects chosen writes.
//!
//! Browser storage fails writes with a quota error at arbitrary points of a
//! multi-key sequence. [`FlakyKvStore`] reproduces that on demand so that the
//! fallback paths of the components above can be exercised deterministically.

use std::sync::{Arc, Mutex};

use crate::error::{StoreError, StoreResult};
use crate::traits::KvStore;

#[derive(Debug, Default)]
struct Plan {
    /// Writes to keys with one of these prefixes always fail.
    rejected_prefixes: Vec<String>,
    /// Writes longer than this (in bytes) fail.
    max_value_len: Option<usize>,
    /// Remaining writes that succeed before every write fails.
    writes_left: Option<usize>,
}

/// Wraps another store and rejects writes according to a plan.
///
/// Reads, removals and key listing always pass through.
pub struct FlakyKvStore {
    inner: Arc<dyn KvStore>,
    plan: Mutex<Plan>,
}

impl FlakyKvStore {
    pub fn new(inner: Arc<dyn KvStore>) -> Self {
        Self {
            inner,
            plan: Mutex::new(Plan::default()),
        }
    }

    /// Reject every write to a key starting with `prefix`.
    pub fn reject_prefix(&self, prefix: impl Into<String>) {
        if let Ok(mut plan) = self.plan.lock() {
            plan.rejected_prefixes.push(prefix.into());
        }
    }

    /// Reject every write whose value is longer than `len` bytes.
    pub fn reject_values_longer_than(&self, len: usize) {
        if let Ok(mut plan) = self.plan.lock() {
            plan.max_value_len = Some(len);
        }
    }

    /// Let `n` more writes through, then reject all writes.
    pub fn fail_after(&self, n: usize) {
        if let Ok(mut plan) = self.plan.lock() {
            plan.writes_left = Some(n);
        }
    }

    /// Clear the plan; all writes pass again.
    pub fn heal(&self) {
        if let Ok(mut plan) = self.plan.lock() {
            *plan = Plan::default();
        }
    }

    fn check(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut plan = self
            .plan
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))?;

        let rejected = plan.rejected_prefixes.iter().any(|p| key.starts_with(p.as_str()))
            || plan.max_value_len.is_some_and(|max| value.len() > max)
            || plan.writes_left == Some(0);

        if rejected {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                needed: value.len(),
                available: 0,
            });
        }
        if let Some(left) = plan.writes_left.as_mut() {
            *left -= 1;
        }
        Ok(())
    }
}

impl KvStore for FlakyKvStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check(key, value)?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        self.inner.remove(key)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        self.inner.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryKvStore;

    fn flaky() -> (Arc<InMemoryKvStore>, FlakyKvStore) {
        let inner = Arc::new(InMemoryKvStore::new());
        let store = FlakyKvStore::new(inner.clone());
        (inner, store)
    }

    #[test]
    fn passes_through_by_default() {
        let (inner, store) = flaky();
        store.set("a", "1").unwrap();
        assert_eq!(inner.get("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn rejects_prefix() {
        let (inner, store) = flaky();
        store.reject_prefix("site_logo_");
        assert!(store.set("site_logo_1", "v").unwrap_err().is_quota());
        store.set("site_logo", "v").unwrap();
        assert!(inner.get("site_logo_1").unwrap().is_none());
    }

    #[test]
    fn fail_after_counts_writes() {
        let (_, store) = flaky();
        store.fail_after(2);
        store.set("a", "1").unwrap();
        store.set("b", "1").unwrap();
        assert!(store.set("c", "1").is_err());
        assert!(store.set("d", "1").is_err());
        store.heal();
        store.set("e", "1").unwrap();
    }

    #[test]
    fn rejects_long_values() {
        let (_, store) = flaky();
        store.reject_values_longer_than(3);
        store.set("a", "123").unwrap();
        assert!(store.set("a", "1234").is_err());
    }
}
