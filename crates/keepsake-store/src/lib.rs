//! Key-value store adapters for Keepsake.
//!
//! Every Keepsake component persists through the [`KvStore`] contract: a
//! synchronous, string-keyed, string-valued store that may refuse a write
//! when its quota is exhausted. The contract mirrors browser local storage so
//! that the same components can sit on top of an origin-scoped store, a file
//! on disk, or a plain map in tests.
//!
//! # Storage Backends
//!
//! - [`InMemoryKvStore`] -- `BTreeMap`-based store with an optional quota
//! - [`FileKvStore`] -- JSON document on disk, rewritten atomically
//! - [`FlakyKvStore`] -- wrapper that rejects chosen writes, for failure paths
//!
//! # Design Rules
//!
//! 1. The store never interprets values -- ownership of a key is a naming
//!    convention held by the caller.
//! 2. `keys()` returns a snapshot; callers may mutate the store while walking
//!    it.
//! 3. Backends propagate failures; degrading to a fallback is the caller's
//!    decision, made per call site.

pub mod error;
pub mod file;
pub mod flaky;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileKvStore;
pub use flaky::FlakyKvStore;
pub use memory::InMemoryKvStore;
pub use traits::{KvStore, KvStoreExt};

/// Storage cost of one entry.
///
/// Browser storage accounts for keys and values in UTF-16 code units; the
/// quota of every backend uses the same measure.
pub fn entry_cost(key: &str, value: &str) -> usize {
    key.encode_utf16().count() + value.encode_utf16().count()
}
