use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use keepsake_store::{KvStore, KvStoreExt, StoreResult};
use keepsake_types::asset::cache_busted;
use keepsake_types::keys::{
    asset_alias_key, asset_index_key, asset_pointer_key, asset_version_key, parse_asset_version,
};
use keepsake_types::AssetKind;

use crate::clock::VersionClock;
use crate::error::{AssetError, AssetResult, WriteStep};

/// Values served when nothing is stored for an asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetDefaults {
    pub logo: String,
    pub favicon: String,
}

impl AssetDefaults {
    pub fn get(&self, kind: AssetKind) -> &str {
        match kind {
            AssetKind::Logo => &self.logo,
            AssetKind::Favicon => &self.favicon,
        }
    }
}

impl Default for AssetDefaults {
    fn default() -> Self {
        Self {
            logo: AssetKind::Logo.default_path().to_string(),
            favicon: AssetKind::Favicon.default_path().to_string(),
        }
    }
}

/// How versions of an asset are enumerated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum VersionScan {
    /// Trust the version index; scan keys only when no index exists.
    #[default]
    Indexed,
    /// Union of the index and a scan of the asset's key prefix.
    Full,
}

/// Stores one current version of each singleton asset under timestamped
/// keys.
pub struct VersionedAssetStore {
    store: Arc<dyn KvStore>,
    clock: VersionClock,
    defaults: AssetDefaults,
}

impl VersionedAssetStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_clock(store, VersionClock::new())
    }

    pub fn with_clock(store: Arc<dyn KvStore>, clock: VersionClock) -> Self {
        Self {
            store,
            clock,
            defaults: AssetDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: AssetDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &AssetDefaults {
        &self.defaults
    }

    // ---- Writes ----

    /// Store a new current version and return its timestamp.
    pub fn store_asset(&self, kind: AssetKind, value: &str) -> AssetResult<u64> {
        let timestamp = self.clock.tick(self.current_version(kind));

        self.store
            .set(&asset_version_key(kind, timestamp), value)
            .map_err(|source| AssetError::VersionWrite {
                kind,
                timestamp,
                source,
            })?;

        // A missing index entry only costs a full scan later.
        if let Err(e) = self.record_version(kind, timestamp) {
            warn!(%kind, timestamp, error = %e, "failed to index asset version");
        }

        self.store
            .set(&asset_pointer_key(kind), &timestamp.to_string())
            .map_err(|source| AssetError::PartialVersion {
                kind,
                timestamp,
                step: WriteStep::Pointer,
                source,
            })?;

        self.store
            .set(asset_alias_key(kind), value)
            .map_err(|source| AssetError::PartialVersion {
                kind,
                timestamp,
                step: WriteStep::Alias,
                source,
            })?;

        debug!(%kind, timestamp, len = value.len(), "stored asset version");
        Ok(timestamp)
    }

    /// Store `value` unless it already is the stored current value.
    ///
    /// Returns the new timestamp, or `None` when nothing was written.
    pub fn ensure_stored(&self, kind: AssetKind, value: &str) -> AssetResult<Option<u64>> {
        if self.load_stored(kind).as_deref() == Some(value) {
            return Ok(None);
        }
        self.store_asset(kind, value).map(Some)
    }

    /// Overwrite only the alias key, leaving versions and pointer alone.
    pub fn store_alias_only(&self, kind: AssetKind, value: &str) -> AssetResult<()> {
        self.store.set(asset_alias_key(kind), value)?;
        Ok(())
    }

    // ---- Reads ----

    /// Timestamp named by the current-version pointer.
    pub fn current_version(&self, kind: AssetKind) -> Option<u64> {
        match self.store.get(&asset_pointer_key(kind)) {
            Ok(Some(raw)) => match raw.trim().parse() {
                Ok(ts) => Some(ts),
                Err(_) => {
                    warn!(%kind, pointer = %raw, "ignoring malformed asset pointer");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(%kind, error = %e, "failed to read asset pointer");
                None
            }
        }
    }

    /// The stored value: current version, else the alias. No default.
    ///
    /// When the alias and the current version disagree, the version wins.
    pub fn load_stored(&self, kind: AssetKind) -> Option<String> {
        if let Some(ts) = self.current_version(kind) {
            match self.store.get(&asset_version_key(kind, ts)) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => debug!(%kind, ts, "current version missing; using alias"),
                Err(e) => warn!(%kind, ts, error = %e, "failed to read asset version"),
            }
        }
        match self.store.get(asset_alias_key(kind)) {
            Ok(value) => value,
            Err(e) => {
                warn!(%kind, error = %e, "failed to read asset alias");
                None
            }
        }
    }

    /// The stored value, falling back to the configured default.
    pub fn load_asset(&self, kind: AssetKind) -> String {
        self.load_stored(kind)
            .unwrap_or_else(|| self.defaults.get(kind).to_string())
    }

    /// The value to display, with a `#t=` fragment naming its version.
    pub fn display_ref(&self, kind: AssetKind) -> String {
        match (self.load_stored(kind), self.current_version(kind)) {
            (Some(value), Some(ts)) => cache_busted(&value, ts),
            (Some(value), None) => value,
            (None, _) => self.defaults.get(kind).to_string(),
        }
    }

    /// Known version timestamps, ascending.
    pub fn versions(&self, kind: AssetKind, scan: VersionScan) -> Vec<u64> {
        let mut versions = match (scan, self.read_index(kind)) {
            (VersionScan::Indexed, Some(index)) => index,
            (VersionScan::Indexed, None) => self.scan_versions(kind),
            (VersionScan::Full, index) => {
                let mut all = index.unwrap_or_default();
                all.extend(self.scan_versions(kind));
                all
            }
        };
        versions.sort_unstable();
        versions.dedup();
        versions
    }

    // ---- Cleanup ----

    /// Delete every version older than the current one.
    pub fn prune_old_versions(&self, kind: AssetKind) -> usize {
        self.prune(kind, VersionScan::Indexed)
    }

    /// Delete the versions older than the one named by the pointer, read
    /// fresh.
    ///
    /// Versions newer than the pointer may belong to a write whose pointer
    /// update is still pending and are kept. Once a later pointer lands they
    /// are older than it and go with the next prune. Without a pointer
    /// nothing can be verified as superseded, so nothing is deleted.
    pub fn prune(&self, kind: AssetKind, scan: VersionScan) -> usize {
        let Some(current) = self.current_version(kind) else {
            debug!(%kind, "no current version; nothing to prune");
            return 0;
        };

        let mut removed = 0;
        let mut kept = Vec::new();
        for ts in self.versions(kind, scan) {
            if ts >= current {
                kept.push(ts);
                continue;
            }
            match self.store.remove(&asset_version_key(kind, ts)) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(%kind, ts, error = %e, "failed to remove asset version");
                    kept.push(ts);
                }
            }
        }

        if let Err(e) = self.store.set_json(&asset_index_key(kind), &kept) {
            warn!(%kind, error = %e, "failed to rewrite asset version index");
        }
        if removed > 0 {
            info!(%kind, removed, current, "pruned old asset versions");
        }
        removed
    }

    /// Remove every key of `kind`: versions, pointer, alias and index.
    ///
    /// Returns the number of keys removed.
    pub fn remove_all(&self, kind: AssetKind) -> usize {
        let mut keys: Vec<String> = self
            .versions(kind, VersionScan::Full)
            .into_iter()
            .map(|ts| asset_version_key(kind, ts))
            .collect();
        keys.push(asset_pointer_key(kind));
        keys.push(asset_alias_key(kind).to_string());
        keys.push(asset_index_key(kind));

        let removed = keys
            .iter()
            .filter(|key| match self.store.remove(key) {
                Ok(existed) => existed,
                Err(e) => {
                    warn!(%kind, key = %key, error = %e, "failed to remove asset key");
                    false
                }
            })
            .count();
        debug!(%kind, removed, "removed all asset keys");
        removed
    }

    // ---- Index ----

    fn record_version(&self, kind: AssetKind, timestamp: u64) -> StoreResult<()> {
        let mut index = self.read_index(kind).unwrap_or_default();
        if !index.contains(&timestamp) {
            index.push(timestamp);
            index.sort_unstable();
        }
        self.store.set_json(&asset_index_key(kind), &index)
    }

    fn read_index(&self, kind: AssetKind) -> Option<Vec<u64>> {
        match self.store.get_json::<Vec<u64>>(&asset_index_key(kind)) {
            Ok(index) => index,
            Err(e) => {
                warn!(%kind, error = %e, "ignoring unreadable asset version index");
                None
            }
        }
    }

    fn scan_versions(&self, kind: AssetKind) -> Vec<u64> {
        let prefix = format!("{}_", kind.storage_name());
        match self.store.keys_with_prefix(&prefix) {
            Ok(keys) => keys
                .iter()
                .filter_map(|key| parse_asset_version(kind, key))
                .collect(),
            Err(e) => {
                warn!(%kind, error = %e, "failed to scan asset keys");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for VersionedAssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedAssetStore")
            .field("clock", &self.clock)
            .field("defaults", &self.defaults)
            .finish()
    }
}
