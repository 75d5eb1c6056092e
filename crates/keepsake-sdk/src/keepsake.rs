use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, info};

use keepsake_assets::VersionedAssetStore;
use keepsake_gc::{GarbageCollector, SweepPolicy, SweepReport};
use keepsake_images::{EntityImageStore, ImageCodec, PassthroughCodec};
use keepsake_listings::ListingStore;
use keepsake_settings::{ExportSink, SettingsPatch, SettingsStore};
use keepsake_store::{FileKvStore, InMemoryKvStore, KvStore};
use keepsake_types::asset::is_data_image;
use keepsake_types::{
    AssetKind, AssetValue, EntityId, ImageScope, Listing, NewListing, SiteSettings,
};

use crate::config::KeepsakeConfig;
use crate::error::{SdkError, SdkResult};
use crate::notify::{Notice, Notifier, TracingNotifier};

/// High-level Keepsake API.
///
/// Every component shares the same persistent store. Mutations an admin
/// triggers directly return `bool` and report their outcome to the
/// [`Notifier`].
pub struct Keepsake {
    config: KeepsakeConfig,
    store: Arc<dyn KvStore>,
    session: Arc<dyn KvStore>,
    assets: Arc<VersionedAssetStore>,
    images: Arc<EntityImageStore>,
    settings: SettingsStore,
    listings: ListingStore,
    gc: GarbageCollector,
    codec: Arc<dyn ImageCodec>,
    notifier: Arc<dyn Notifier>,
}

impl Keepsake {
    /// Open the file-backed stores named by `config`.
    pub fn open(config: KeepsakeConfig) -> SdkResult<Self> {
        let store: Arc<dyn KvStore> =
            Arc::new(FileKvStore::open(&config.store.path, config.store.quota)?);
        let session: Arc<dyn KvStore> = match &config.store.session_path {
            Some(path) => Arc::new(FileKvStore::open(path, None)?),
            None => Arc::new(InMemoryKvStore::new()),
        };
        Ok(Self::with_stores(config, store, session))
    }

    /// Memory-only stores; the configured quota still applies.
    pub fn in_memory(config: KeepsakeConfig) -> Self {
        let store: Arc<dyn KvStore> = match config.store.quota {
            Some(quota) => Arc::new(InMemoryKvStore::with_quota(quota)),
            None => Arc::new(InMemoryKvStore::new()),
        };
        Self::with_stores(config, store, Arc::new(InMemoryKvStore::new()))
    }

    pub fn with_stores(
        config: KeepsakeConfig,
        store: Arc<dyn KvStore>,
        session: Arc<dyn KvStore>,
    ) -> Self {
        let assets = Arc::new(
            VersionedAssetStore::new(store.clone()).with_defaults(config.assets.clone()),
        );
        let images = Arc::new(EntityImageStore::with_config(
            store.clone(),
            config.images.clone(),
        ));
        let settings = SettingsStore::open(store.clone(), session.clone(), assets.clone())
            .with_fallback_len(config.settings.fallback_len);
        let listings = ListingStore::new(store.clone(), images.clone());
        let gc = GarbageCollector::new(images.clone(), assets.clone());
        debug!(quota = ?config.store.quota, "keepsake ready");

        Self {
            config,
            store,
            session,
            assets,
            images,
            settings,
            listings,
            gc,
            codec: Arc::new(PassthroughCodec),
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    // ---- Accessors ----

    pub fn config(&self) -> &KeepsakeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn session(&self) -> &Arc<dyn KvStore> {
        &self.session
    }

    pub fn assets(&self) -> &VersionedAssetStore {
        &self.assets
    }

    pub fn images(&self) -> &EntityImageStore {
        &self.images
    }

    pub fn settings_store(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn listings(&self) -> &ListingStore {
        &self.listings
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> SiteSettings {
        self.settings.settings()
    }

    // ---- Uploads ----

    pub async fn upload_logo(&self, bytes: &[u8], media_type: &str) -> bool {
        self.upload(AssetKind::Logo, bytes, media_type).await
    }

    pub async fn upload_favicon(&self, bytes: &[u8], media_type: &str) -> bool {
        self.upload(AssetKind::Favicon, bytes, media_type).await
    }

    /// Replace an asset with uploaded image bytes.
    pub async fn upload(&self, kind: AssetKind, bytes: &[u8], media_type: &str) -> bool {
        match self.try_upload(kind, bytes, media_type).await {
            Ok(()) => self.report(Ok(format!("{kind} updated"))),
            Err(e) => self.report(Err(format!("{kind} upload failed: {e}"))),
        }
    }

    async fn try_upload(&self, kind: AssetKind, bytes: &[u8], media_type: &str) -> SdkResult<()> {
        if bytes.is_empty() {
            return Err(SdkError::EmptyUpload { kind });
        }
        let limit = self.config.uploads.max_bytes(kind);
        if bytes.len() > limit {
            return Err(SdkError::UploadTooLarge {
                kind,
                size: bytes.len(),
                limit,
            });
        }
        let media_type = media_type.trim().to_ascii_lowercase();
        if !media_type.starts_with("image/") {
            return Err(SdkError::UnsupportedMediaType { kind, media_type });
        }

        let data_url = encode_data_url(&media_type, bytes);
        let image = self
            .codec
            .compress(&data_url, self.config.uploads.quality)
            .await?;

        // Applying an inline value writes a new version of it.
        self.settings
            .apply(&SettingsPatch::new().set(kind.field_name(), image.clone()))?;
        if kind == AssetKind::Logo {
            self.settings.mirror_session_logo(&image);
        }
        info!(%kind, bytes = bytes.len(), encoded = image.len(), "uploaded asset");
        Ok(())
    }

    // ---- Settings ----

    /// Merge `patch` into the settings.
    pub fn update_settings(&self, patch: &SettingsPatch) -> bool {
        match self.settings.apply(patch) {
            Ok(_) => self.report(Ok("settings saved".into())),
            Err(e) => self.report(Err(format!("settings not saved: {e}"))),
        }
    }

    pub fn import_settings(&self, document: &str) -> bool {
        if self.settings.import(document) {
            self.report(Ok("settings imported".into()))
        } else {
            self.report(Err("settings file is invalid".into()))
        }
    }

    pub fn export_settings(&self, sink: &mut dyn ExportSink) -> bool {
        if self.settings.export(sink) {
            self.report(Ok("settings exported".into()))
        } else {
            self.report(Err("settings export failed".into()))
        }
    }

    pub fn reset_settings(&self) -> bool {
        self.settings.reset();
        self.report(Ok("settings reset to defaults".into()))
    }

    // ---- Display ----

    pub fn logo_url(&self) -> String {
        self.display_url(AssetKind::Logo)
    }

    pub fn favicon_url(&self) -> String {
        self.display_url(AssetKind::Favicon)
    }

    /// What to render for an asset. Stored image data carries a `#t=`
    /// fragment; anything unusable becomes the placeholder.
    pub fn display_url(&self, kind: AssetKind) -> String {
        let url = match self.settings.settings().asset(kind) {
            AssetValue::Inline(data) if !is_data_image(data) => String::new(),
            AssetValue::Inline(data)
                if self.assets.load_stored(kind).as_deref() == Some(data.as_str()) =>
            {
                self.assets.display_ref(kind)
            }
            value => value.as_str().trim().to_string(),
        };
        if url.is_empty() {
            self.config.display.placeholder(kind).to_string()
        } else {
            url
        }
    }

    // ---- Images ----

    /// Compress and store images for `scope` with the configured codec.
    pub async fn stage_images(&self, scope: &ImageScope, images: &[String]) -> Vec<String> {
        self.images
            .stage_compressed(scope, images, self.codec.as_ref())
            .await
    }

    // ---- Listings ----

    /// Create a listing, moving any staged images onto it.
    pub fn create_listing(&self, new: NewListing) -> Option<Listing> {
        match self.listings.create(new) {
            Ok(listing) => {
                self.report(Ok(format!("listing {} created", listing.id)));
                Some(listing)
            }
            Err(e) => {
                self.report(Err(format!("listing not saved: {e}")));
                None
            }
        }
    }

    /// Replace a stored listing. An unknown id is reported as an error.
    pub fn update_listing(&self, listing: Listing) -> Option<Listing> {
        if self.listings.get(&listing.id).is_none() {
            self.report(Err(format!("listing {} not found", listing.id)));
            return None;
        }
        match self.listings.update(listing) {
            Ok(listing) => {
                self.report(Ok(format!("listing {} saved", listing.id)));
                Some(listing)
            }
            Err(e) => {
                self.report(Err(format!("listing not saved: {e}")));
                None
            }
        }
    }

    pub fn delete_listing(&self, id: &EntityId) -> bool {
        match self.listings.delete(id) {
            Ok(true) => self.report(Ok(format!("listing {id} deleted"))),
            Ok(false) => self.report(Err(format!("listing {id} not found"))),
            Err(e) => self.report(Err(format!("listing not deleted: {e}"))),
        }
    }

    // ---- Maintenance ----

    /// Sweep with the configured staging TTL.
    pub fn sweep(&self, full_scan: bool) -> SweepReport {
        let ttl = Duration::from_secs(self.config.gc.staging_ttl_secs);
        let policy = SweepPolicy::staging_older_than(ttl);
        let policy = if full_scan {
            policy.with_full_scan()
        } else {
            policy
        };
        self.gc.sweep(&policy)
    }

    pub fn sweep_with(&self, policy: &SweepPolicy) -> SweepReport {
        self.gc.sweep(policy)
    }

    fn report(&self, outcome: Result<String, String>) -> bool {
        match outcome {
            Ok(message) => {
                self.notifier.notify(Notice::Success(message));
                true
            }
            Err(message) => {
                self.notifier.notify(Notice::Error(message));
                false
            }
        }
    }
}

impl std::fmt::Debug for Keepsake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keepsake")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn encode_data_url(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{media_type};base64,{}", STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keepsake_images::CodecError;
    use keepsake_settings::MemorySink;
    use keepsake_store::FlakyKvStore;
    use keepsake_types::keys::SESSION_LOGO_KEY;

    use crate::notify::RecordingNotifier;

    const PNG: &[u8] = b"PNG";
    const PNG_URL: &str = "data:image/png;base64,UE5H";

    fn keepsake() -> (Keepsake, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let k = Keepsake::in_memory(KeepsakeConfig::default()).with_notifier(notifier.clone());
        (k, notifier)
    }

    struct FailingCodec;

    #[async_trait]
    impl ImageCodec for FailingCodec {
        async fn compress(&self, _: &str, _: f32) -> Result<String, CodecError> {
            Err(CodecError::Failed("decoder crashed".into()))
        }
    }

    // -----------------------------------------------------------------------
    // Uploads
    // -----------------------------------------------------------------------

    #[test]
    fn data_url_encoding() {
        assert_eq!(encode_data_url("image/png", PNG), PNG_URL);
    }

    #[tokio::test]
    async fn upload_logo_updates_everything() {
        let (k, notifier) = keepsake();
        assert!(k.upload_logo(PNG, "image/png").await);

        assert_eq!(k.settings().logo, AssetValue::Inline(PNG_URL.into()));
        assert_eq!(k.assets().load_stored(AssetKind::Logo).as_deref(), Some(PNG_URL));
        assert!(k.assets().current_version(AssetKind::Logo).is_some());
        assert_eq!(k.session().get(SESSION_LOGO_KEY).unwrap().as_deref(), Some(PNG_URL));
        assert_eq!(notifier.last(), Some(Notice::Success("logo updated".into())));
    }

    #[tokio::test]
    async fn upload_favicon_does_not_touch_session() {
        let (k, _) = keepsake();
        assert!(k.upload_favicon(PNG, "Image/PNG").await);
        assert_eq!(k.settings().favicon.as_str(), PNG_URL);
        assert!(k.session().get(SESSION_LOGO_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let (k, notifier) = keepsake();
        let bytes = vec![0u8; 1024 * 1024 + 1];
        assert!(!k.upload_favicon(&bytes, "image/x-icon").await);
        assert_eq!(k.settings().favicon, AssetValue::default_for(AssetKind::Favicon));
        assert!(notifier.last().unwrap().is_error());

        // The same size fits the logo limit.
        assert!(k.upload_logo(&bytes, "image/png").await);
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected() {
        let (k, notifier) = keepsake();
        assert!(!k.upload_logo(PNG, "text/plain").await);
        assert!(!k.upload_logo(&[], "image/png").await);
        assert_eq!(notifier.notices().len(), 2);
        assert!(notifier.notices().iter().all(Notice::is_error));
        assert!(k.assets().load_stored(AssetKind::Logo).is_none());
    }

    #[tokio::test]
    async fn codec_failure_leaves_settings_alone() {
        let (k, notifier) = keepsake();
        let k = k.with_codec(Arc::new(FailingCodec));
        assert!(!k.upload_logo(PNG, "image/png").await);
        assert_eq!(k.settings().logo, AssetValue::default_for(AssetKind::Logo));
        assert!(notifier.last().unwrap().message().contains("decoder crashed"));
    }

    // -----------------------------------------------------------------------
    // Display
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn display_urls() {
        let (k, _) = keepsake();
        assert_eq!(k.logo_url(), AssetKind::Logo.default_path());
        assert_eq!(k.favicon_url(), "/favicon.ico");

        k.upload_logo(PNG, "image/png").await;
        let ts = k.assets().current_version(AssetKind::Logo).unwrap();
        assert_eq!(k.logo_url(), format!("{PNG_URL}#t={ts}"));
    }

    #[test]
    fn unusable_values_show_placeholder() {
        let (k, _) = keepsake();
        assert!(k.update_settings(&SettingsPatch::new().set("logo", " ")));
        assert_eq!(k.logo_url(), "/placeholder.svg");

        assert!(k.update_settings(&SettingsPatch::new().set("logo", "data:text/plain;base64,AA")));
        assert_eq!(k.logo_url(), "/placeholder.svg");
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    #[test]
    fn rejected_patch_is_reported() {
        let (k, notifier) = keepsake();
        assert!(!k.update_settings(&SettingsPatch::new().set("noSuchField", 1)));
        assert!(notifier.last().unwrap().is_error());
    }

    #[tokio::test]
    async fn export_then_import_keeps_logo() {
        let (k, notifier) = keepsake();
        k.upload_logo(PNG, "image/png").await;

        let mut sink = MemorySink::default();
        assert!(k.export_settings(&mut sink));
        let (_, document) = sink.files.pop().unwrap();
        assert!(document.contains("stored_separately"));

        assert!(k.update_settings(&SettingsPatch::new().set("siteName", "Elsewhere")));
        assert!(k.import_settings(&document));
        assert_eq!(k.settings().logo.as_str(), PNG_URL);
        assert_eq!(k.settings().site_name, "Shalom Job Center");

        assert!(!k.import_settings("[]"));
        assert_eq!(notifier.last(), Some(Notice::Error("settings file is invalid".into())));
    }

    #[tokio::test]
    async fn reset_removes_stored_assets() {
        let (k, _) = keepsake();
        k.upload_logo(PNG, "image/png").await;
        assert!(k.reset_settings());

        assert_eq!(k.settings(), k.settings_store().defaults());
        assert!(k.store().get("site_logo").unwrap().is_none());
        assert!(k.session().get(SESSION_LOGO_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn reopened_store_resolves_uploaded_logo() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = KeepsakeConfig::default();
        config.store.path = dir.path().join("site.json");

        let k = Keepsake::open(config.clone()).unwrap();
        assert!(k.upload_logo(PNG, "image/png").await);
        drop(k);

        let k = Keepsake::open(config).unwrap();
        assert_eq!(k.settings().logo.as_str(), PNG_URL);
        let raw: serde_json::Value =
            serde_json::from_str(&k.store().get("siteSettings").unwrap().unwrap()).unwrap();
        assert_eq!(raw["logo"], "stored_separately");
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn sweep_prunes_old_logo_versions() {
        let (k, _) = keepsake();
        k.upload_logo(b"one", "image/png").await;
        k.upload_logo(b"two", "image/png").await;

        let report = k.sweep(false);
        assert_eq!(report.versions_removed.get(&AssetKind::Logo), Some(&1));
        assert_eq!(
            k.assets().load_stored(AssetKind::Logo),
            Some(encode_data_url("image/png", b"two"))
        );
    }

    #[tokio::test]
    async fn staged_images_survive_a_default_sweep() {
        let (k, _) = keepsake();
        let stored = k
            .stage_images(&ImageScope::Staging, &["https://a".to_string()])
            .await;
        assert_eq!(stored.len(), 1);
        assert!(stored[0].starts_with("https://a#t="));

        assert_eq!(k.sweep(false).staging_removed, 0);
        let policy = SweepPolicy {
            staging_cutoff_ms: Some(u64::MAX),
            full_scan: false,
        };
        assert_eq!(k.sweep_with(&policy).staging_removed, 1);
    }

    // -----------------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------------

    fn new_listing(title: &str) -> NewListing {
        NewListing {
            title: title.to_string(),
            location: "Addis Ababa".to_string(),
            ..NewListing::default()
        }
    }

    #[test]
    fn listing_lifecycle_is_reported() {
        let (k, notifier) = keepsake();
        let listing = k.create_listing(new_listing("Cook")).unwrap();
        let last = notifier.last().unwrap();
        assert!(!last.is_error());
        assert!(last.message().contains(listing.id.as_str()));

        let mut edited = listing.clone();
        edited.title = "Head cook".to_string();
        let saved = k.update_listing(edited).unwrap();
        assert_eq!(saved.title, "Head cook");
        assert!(!notifier.last().unwrap().is_error());
        assert_eq!(k.listings().get(&listing.id).unwrap().title, "Head cook");

        assert!(k.delete_listing(&listing.id));
        assert!(!notifier.last().unwrap().is_error());
        assert!(k.listings().list().is_empty());
    }

    #[test]
    fn unknown_listing_is_reported_as_error() {
        let (k, notifier) = keepsake();
        let listing = k.create_listing(new_listing("Driver")).unwrap();
        assert!(k.delete_listing(&listing.id));

        assert!(!k.delete_listing(&listing.id));
        assert!(notifier.last().unwrap().message().contains("not found"));
        assert!(k.update_listing(listing).is_none());
        assert!(notifier.last().unwrap().is_error());
        assert!(k.listings().list().is_empty());
    }

    #[test]
    fn refused_listing_write_is_reported() {
        let flaky = Arc::new(FlakyKvStore::new(Arc::new(InMemoryKvStore::new())));
        flaky.reject_prefix(keepsake_types::keys::LISTINGS_KEY);
        let notifier = Arc::new(RecordingNotifier::new());
        let k = Keepsake::with_stores(
            KeepsakeConfig::default(),
            flaky.clone(),
            Arc::new(InMemoryKvStore::new()),
        )
        .with_notifier(notifier.clone());

        assert!(k.create_listing(new_listing("Guard")).is_none());
        let last = notifier.last().unwrap();
        assert!(last.is_error());
        assert!(last.message().starts_with("listing not saved"));
        assert!(k.listings().list().is_empty());
    }
}
