use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use keepsake_assets::VersionedAssetStore;
use keepsake_store::{KvStore, KvStoreExt};
use keepsake_types::asset::is_data_image;
use keepsake_types::keys::{SESSION_LOGO_KEY, SETTINGS_KEY};
use keepsake_types::{AssetKind, AssetRef, AssetValue, SiteSettings};

use crate::error::SettingsResult;
use crate::patch::SettingsPatch;

/// Length of the truncated value written when a full asset write is refused.
pub const DEFAULT_FALLBACK_LEN: usize = 1_000_000;

/// Owner of the in-memory settings aggregate.
///
/// `store` is the persistent origin store; `session` lives as long as the
/// current tab and only carries the `current_logo` mirror.
pub struct SettingsStore {
    store: Arc<dyn KvStore>,
    session: Arc<dyn KvStore>,
    assets: Arc<VersionedAssetStore>,
    current: RwLock<SiteSettings>,
    fallback_len: usize,
}

impl SettingsStore {
    /// Create the store and load the persisted aggregate.
    pub fn open(
        store: Arc<dyn KvStore>,
        session: Arc<dyn KvStore>,
        assets: Arc<VersionedAssetStore>,
    ) -> Self {
        let this = Self {
            store,
            session,
            assets,
            current: RwLock::new(SiteSettings::default()),
            fallback_len: DEFAULT_FALLBACK_LEN,
        };
        this.load();
        this
    }

    pub fn with_fallback_len(mut self, len: usize) -> Self {
        self.fallback_len = len;
        self
    }

    pub fn assets(&self) -> &VersionedAssetStore {
        &self.assets
    }

    /// Snapshot of the in-memory aggregate.
    pub fn settings(&self) -> SiteSettings {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    // ---- Load ----

    /// Re-read the aggregate from the store and make it current.
    pub fn load(&self) -> SiteSettings {
        let settings = self.read_persisted();
        self.replace(settings.clone());
        settings
    }

    fn read_persisted(&self) -> SiteSettings {
        let persisted = match self.store.get_json::<SiteSettings<AssetRef>>(SETTINGS_KEY) {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                debug!("no stored settings; using defaults");
                self.defaults().offloaded()
            }
            Err(e) => {
                warn!(error = %e, "stored settings unreadable; using defaults");
                self.defaults().offloaded()
            }
        };

        let mut settings = persisted.map_assets(|kind, reference| match reference.resolved() {
            Some(value) => value,
            None => self.resolve_offloaded(kind),
        });
        settings.dark_mode = false;
        settings
    }

    /// Value of an offloaded asset field.
    fn resolve_offloaded(&self, kind: AssetKind) -> AssetValue {
        let stored = self.assets.load_stored(kind).or_else(|| match kind {
            AssetKind::Logo => self.session_logo(),
            AssetKind::Favicon => None,
        });

        match stored.and_then(AssetValue::parse) {
            Some(value) if kind == AssetKind::Logo && !is_data_image(value.as_str()) => {
                warn!(%kind, "stored logo is not image data; using default");
                self.default_asset(kind)
            }
            Some(value) => {
                debug!(%kind, len = value.as_str().len(), "resolved offloaded asset");
                value
            }
            None => {
                warn!(%kind, "offloaded asset not found; using default");
                self.default_asset(kind)
            }
        }
    }

    // ---- Update ----

    /// Merge `patch` into the aggregate and persist it.
    ///
    /// A patch that does not fit is rejected and nothing changes. The write
    /// lock is held from merge to persist, so concurrent patches serialize.
    pub fn apply(&self, patch: &SettingsPatch) -> SettingsResult<SiteSettings> {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let merged = patch.apply_to(&current)?;
        *current = merged.clone();
        self.persist_settings(&merged);
        drop(current);
        debug!(fields = patch.fields().len(), "applied settings patch");
        Ok(merged)
    }

    /// Persist the current aggregate.
    pub fn persist(&self) {
        self.persist_settings(&self.settings());
    }

    /// Restore defaults and remove every stored asset key.
    pub fn reset(&self) -> SiteSettings {
        for kind in AssetKind::ALL {
            self.assets.remove_all(kind);
        }
        if let Err(e) = self.session.remove(SESSION_LOGO_KEY) {
            warn!(error = %e, "failed to clear session logo mirror");
        }

        let defaults = self.defaults();
        self.replace(defaults.clone());
        self.persist_settings(&defaults);
        info!("settings reset to defaults");
        defaults
    }

    // ---- Session mirror ----

    /// Mirror the active logo into the session store.
    pub fn mirror_session_logo(&self, logo: &str) {
        if let Err(e) = self.session.set(SESSION_LOGO_KEY, logo) {
            warn!(error = %e, "failed to mirror logo into session store");
        }
    }

    pub fn session_logo(&self) -> Option<String> {
        match self.session.get(SESSION_LOGO_KEY) {
            Ok(logo) => logo,
            Err(e) => {
                warn!(error = %e, "failed to read session logo mirror");
                None
            }
        }
    }

    // ---- Internals ----

    /// Defaults with the asset store's configured default paths.
    pub fn defaults(&self) -> SiteSettings {
        let mut defaults = SiteSettings::default();
        for kind in AssetKind::ALL {
            defaults.set_asset(kind, self.default_asset(kind));
        }
        defaults
    }

    pub(crate) fn default_asset(&self, kind: AssetKind) -> AssetValue {
        AssetValue::External(self.assets.defaults().get(kind).to_string())
    }

    fn replace(&self, settings: SiteSettings) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    fn persist_settings(&self, settings: &SiteSettings) {
        for kind in AssetKind::ALL {
            if let AssetValue::Inline(data) = settings.asset(kind) {
                self.persist_asset(kind, data);
            }
        }

        let mut persisted = settings.offloaded();
        persisted.dark_mode = false;
        match self.store.set_json(SETTINGS_KEY, &persisted) {
            Ok(()) => debug!("persisted settings"),
            Err(e) => warn!(error = %e, "failed to persist settings"),
        }
    }

    fn persist_asset(&self, kind: AssetKind, data: &str) {
        let err = match self.assets.ensure_stored(kind, data) {
            Ok(Some(timestamp)) => {
                debug!(%kind, timestamp, "persisted inline asset");
                return;
            }
            Ok(None) => return,
            Err(e) => e,
        };

        warn!(%kind, error = %err, "failed to persist asset; writing reduced-size fallback");
        let reduced = truncate_chars(data, self.fallback_len);
        match self.assets.store_alias_only(kind, reduced) {
            Ok(()) => info!(%kind, len = reduced.len(), "stored reduced-size asset"),
            Err(e) => warn!(%kind, error = %e, "reduced-size fallback failed; giving up"),
        }
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("assets", &self.assets)
            .field("fallback_len", &self.fallback_len)
            .finish()
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}
