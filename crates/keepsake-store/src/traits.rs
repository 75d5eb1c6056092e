use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreResult;

/// Synchronous, quota-limited, string-only key-value store.
///
/// All implementations must satisfy these invariants:
/// - `get` after a successful `set` on the same key returns the written value.
/// - A failed `set` leaves the previous value (if any) in place.
/// - `keys` returns a snapshot that stays valid while the caller mutates the
///   store.
/// - The store never interprets keys or values.
pub trait KvStore: Send + Sync {
    /// Read the value at `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write `value` at `key`, replacing any previous value.
    ///
    /// Fails with [`StoreError::QuotaExceeded`](crate::StoreError::QuotaExceeded)
    /// when the store cannot hold the new entry.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete `key`. Returns `true` if it existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Snapshot of every key currently stored.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Check whether a key exists.
    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Snapshot of the keys starting with `prefix`.
    ///
    /// Default implementation filters `keys()`. Backends may override.
    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}

/// JSON helpers over any [`KvStore`], including trait objects.
pub trait KvStoreExt: KvStore {
    /// Read and decode a JSON value.
    ///
    /// `Ok(None)` when the key is absent; `Err` when the stored text is not
    /// valid JSON for `T`.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode and write a JSON value.
    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}
