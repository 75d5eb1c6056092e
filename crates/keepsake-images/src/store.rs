use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use keepsake_store::{KvStore, KvStoreExt};
use keepsake_types::asset::{cache_busted, is_ephemeral, is_persistable_image};
use keepsake_types::keys::{featured_key, image_index_key, images_key, is_image_key};
use keepsake_types::{wall_clock_ms, EntityId, ImageScope};

use crate::codec::ImageCodec;
use crate::error::{ImageError, ImageResult};
use crate::index::ImageIndex;

/// Substituted for image references that did not survive a reload.
pub const DEFAULT_PLACEHOLDER: &str = "https://source.unsplash.com/random/800x600/?work";

/// Tuning of the image store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageStoreConfig {
    /// Images kept per set.
    pub max_images: usize,
    /// Quality passed to the codec when staging.
    pub quality: f32,
    pub placeholder: String,
}

impl Default for ImageStoreConfig {
    fn default() -> Self {
        Self {
            max_images: 3,
            quality: 0.6,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

/// Image sets keyed by entity id, plus one staging set.
pub struct EntityImageStore {
    store: Arc<dyn KvStore>,
    config: ImageStoreConfig,
}

impl EntityImageStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_config(store, ImageStoreConfig::default())
    }

    pub fn with_config(store: Arc<dyn KvStore>, config: ImageStoreConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ImageStoreConfig {
        &self.config
    }

    // ---- Writes ----

    /// Persist the valid images of `entity` and make the first one featured.
    ///
    /// Only `data:image/` and `http(s)://` values are kept. When none remain
    /// nothing is written. Returns the number of images stored.
    pub fn save_images(&self, entity: &EntityId, images: &[String]) -> usize {
        let valid: Vec<String> = images
            .iter()
            .filter(|img| is_persistable_image(img))
            .take(self.config.max_images)
            .cloned()
            .collect();

        if valid.is_empty() {
            debug!(entity = %entity, offered = images.len(), "no valid images to save");
            return 0;
        }

        let scope = ImageScope::from(entity);
        if let Err(e) = self.write_set(&scope, &valid, true) {
            warn!(entity = %entity, error = %e, "failed to save images");
            return 0;
        }
        self.update_index(|index| {
            index.insert(entity);
        });
        debug!(entity = %entity, count = valid.len(), "saved images");
        valid.len()
    }

    /// Compress up to `max_images` images and store them under `scope`.
    ///
    /// Each stored image carries a `#t=` fragment. Images the codec rejects
    /// are dropped. Returns what was stored.
    pub async fn stage_compressed(
        &self,
        scope: &ImageScope,
        images: &[String],
        codec: &dyn ImageCodec,
    ) -> Vec<String> {
        let mut processed = Vec::with_capacity(self.config.max_images);
        for image in images.iter().take(self.config.max_images) {
            match codec.compress(image, self.config.quality).await {
                Ok(compressed) if !compressed.is_empty() => {
                    processed.push(cache_busted(&compressed, wall_clock_ms()));
                }
                Ok(_) => warn!(scope = scope.suffix(), "codec returned an empty image"),
                Err(e) => {
                    warn!(scope = scope.suffix(), error = %e, "dropping image that failed to compress")
                }
            }
        }

        if processed.is_empty() {
            return processed;
        }
        if let Err(e) = self.write_set(scope, &processed, false) {
            warn!(scope = scope.suffix(), error = %e, "failed to store compressed images");
            return Vec::new();
        }

        self.update_index(|index| match scope {
            ImageScope::Staging => index.staged_at = Some(wall_clock_ms()),
            ImageScope::Entity(id) => {
                index.insert(id);
            }
        });
        info!(scope = scope.suffix(), count = processed.len(), "stored compressed images");
        processed
    }

    /// Move the staging set to `entity`.
    ///
    /// Idempotent: without staged data nothing changes. Returns whether
    /// anything was moved.
    pub fn finalize_staged_images(&self, entity: &EntityId) -> bool {
        match self.try_finalize(entity) {
            Ok(moved) => moved,
            Err(e) => {
                warn!(entity = %entity, error = %e, "failed to finalize staged images");
                false
            }
        }
    }

    fn try_finalize(&self, entity: &EntityId) -> ImageResult<bool> {
        let staging_images = images_key(&ImageScope::Staging);
        let staging_featured = featured_key(&ImageScope::Staging);
        let images = self.store.get(&staging_images)?;
        let featured = self.store.get(&staging_featured)?;

        if images.is_none() && featured.is_none() {
            return Ok(false);
        }

        let scope = ImageScope::from(entity);
        if let Some(images) = &images {
            self.store.set(&images_key(&scope), images)?;
        }
        match &featured {
            Some(featured) => self.store.set(&featured_key(&scope), featured)?,
            None => {
                self.store.remove(&featured_key(&scope))?;
            }
        }
        self.store.remove(&staging_images)?;
        self.store.remove(&staging_featured)?;

        self.update_index(|index| {
            index.insert(entity);
            index.staged_at = None;
        });
        info!(entity = %entity, "finalized staged images");
        Ok(true)
    }

    /// Remove both keys of `entity`'s set.
    pub fn clear_images(&self, entity: &EntityId) {
        let scope = ImageScope::from(entity);
        for key in [images_key(&scope), featured_key(&scope)] {
            if let Err(e) = self.store.remove(&key) {
                warn!(entity = %entity, key = %key, error = %e, "failed to remove image key");
            }
        }
        self.update_index(|index| {
            index.remove(entity);
        });
        debug!(entity = %entity, "cleared images");
    }

    /// Remove the staging set. Returns the number of keys removed.
    pub fn clear_staged(&self) -> usize {
        let removed: usize = [images_key(&ImageScope::Staging), featured_key(&ImageScope::Staging)]
            .iter()
            .map(|key| self.remove_counted(key))
            .sum();
        self.update_index(|index| index.staged_at = None);
        debug!(removed, "cleared staged images");
        removed
    }

    /// Remove every image-store key of every entity, staging included.
    ///
    /// Indexed sets go first. A key scan then catches sets written before the
    /// index existed; when the scan fails the indexed sets are still gone.
    /// Returns the number of keys removed.
    pub fn purge_all(&self) -> usize {
        let mut removed = 0;
        for scope in self.index().scopes().chain([ImageScope::Staging]) {
            for key in [images_key(&scope), featured_key(&scope)] {
                removed += self.remove_counted(&key);
            }
        }

        let indexed = removed;
        match self.store.keys() {
            Ok(keys) => {
                for key in keys.iter().filter(|k| is_image_key(k)) {
                    removed += self.remove_counted(key);
                }
            }
            Err(e) => warn!(error = %e, "failed to list keys for purge"),
        }
        if removed > indexed {
            debug!(unindexed = removed - indexed, "purged image keys missing from the index");
        }

        if let Err(e) = self.store.remove(&image_index_key()) {
            warn!(error = %e, "failed to remove image index");
        }
        info!(removed, "purged all image sets");
        removed
    }

    // ---- Reads ----

    /// Images of `scope`, or an empty list when absent or unreadable.
    ///
    /// Ephemeral references are dropped; a set made only of them reads as the
    /// placeholder.
    pub fn get_images(&self, scope: &ImageScope) -> Vec<String> {
        let images = match self.read_set(scope) {
            Ok(images) => images,
            Err(e) => {
                warn!(scope = scope.suffix(), error = %e, "ignoring unreadable image list");
                return Vec::new();
            }
        };
        if !images.iter().any(|img| is_ephemeral(img)) {
            return images;
        }

        warn!(scope = scope.suffix(), "discarding ephemeral image references");
        let kept: Vec<String> = images.into_iter().filter(|img| !is_ephemeral(img)).collect();
        if kept.is_empty() {
            vec![self.config.placeholder.clone()]
        } else {
            kept
        }
    }

    /// Featured image of `scope`: the featured key, else the first image,
    /// else an empty string.
    pub fn get_featured_image(&self, scope: &ImageScope) -> String {
        match self.store.get(&featured_key(scope)) {
            Ok(Some(featured)) if is_ephemeral(&featured) => {
                return self.config.placeholder.clone();
            }
            Ok(Some(featured)) if !featured.is_empty() => return featured,
            Ok(_) => {}
            Err(e) => warn!(scope = scope.suffix(), error = %e, "failed to read featured image"),
        }
        self.get_images(scope).into_iter().next().unwrap_or_default()
    }

    /// Whether `scope` has a stored image list.
    pub fn has_images(&self, scope: &ImageScope) -> bool {
        self.store.contains(&images_key(scope)).unwrap_or(false)
    }

    /// Whether either staging key exists.
    pub fn has_staged(&self) -> bool {
        self.has_images(&ImageScope::Staging)
            || self
                .store
                .contains(&featured_key(&ImageScope::Staging))
                .unwrap_or(false)
    }

    /// The sweep index, empty when absent or unreadable.
    pub fn index(&self) -> ImageIndex {
        match self.store.get_json::<ImageIndex>(&image_index_key()) {
            Ok(index) => index.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable image index");
                ImageIndex::default()
            }
        }
    }

    // ---- Internals ----

    fn read_set(&self, scope: &ImageScope) -> ImageResult<Vec<String>> {
        let key = images_key(scope);
        match self.store.get(&key)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| ImageError::Malformed {
                key,
                reason: e.to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }

    /// Write the list of `scope`. With `featured` the first image becomes the
    /// featured one; otherwise a stale featured key is dropped so reads fall
    /// back to the new first image.
    fn write_set(&self, scope: &ImageScope, images: &[String], featured: bool) -> ImageResult<()> {
        self.store.set_json(&images_key(scope), images)?;
        match images.first() {
            Some(first) if featured => self.store.set(&featured_key(scope), first)?,
            _ => {
                self.store.remove(&featured_key(scope))?;
            }
        }
        Ok(())
    }

    fn remove_counted(&self, key: &str) -> usize {
        match self.store.remove(key) {
            Ok(true) => 1,
            Ok(false) => 0,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to remove image key");
                0
            }
        }
    }

    fn update_index(&self, f: impl FnOnce(&mut ImageIndex)) {
        let mut index = self.index();
        f(&mut index);
        if let Err(e) = self.store.set_json(&image_index_key(), &index) {
            warn!(error = %e, "failed to update image index");
        }
    }
}

impl std::fmt::Debug for EntityImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityImageStore")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keepsake_store::InMemoryKvStore;
    use proptest::prelude::*;

    use crate::codec::{CodecError, PassthroughCodec};

    fn setup() -> (Arc<InMemoryKvStore>, EntityImageStore) {
        let kv = Arc::new(InMemoryKvStore::new());
        let images = EntityImageStore::new(kv.clone());
        (kv, images)
    }

    fn id(s: &str) -> EntityId {
        EntityId::new(s).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // Save and read
    // -----------------------------------------------------------------------

    #[test]
    fn save_filters_invalid_images() {
        let (_, images) = setup();
        let job1 = id("job1");
        let saved = images.save_images(
            &job1,
            &strings(&["data:image/png;base64,AAA", "not-an-image", "https://x/y.jpg"]),
        );
        assert_eq!(saved, 2);

        let scope = ImageScope::from(&job1);
        assert_eq!(
            images.get_images(&scope),
            strings(&["data:image/png;base64,AAA", "https://x/y.jpg"])
        );
        assert_eq!(images.get_featured_image(&scope), "data:image/png;base64,AAA");
        assert!(images.get_images(&ImageScope::Staging).is_empty());
    }

    #[test]
    fn save_with_nothing_valid_is_a_noop() {
        let (kv, images) = setup();
        assert_eq!(images.save_images(&id("job1"), &strings(&["blob:http://x/1", ""])), 0);
        assert!(kv.is_empty());
    }

    #[test]
    fn save_caps_the_set() {
        let (_, images) = setup();
        let all = strings(&["https://a", "https://b", "https://c", "https://d"]);
        assert_eq!(images.save_images(&id("job1"), &all), 3);
        assert_eq!(images.get_images(&ImageScope::from(&id("job1"))).len(), 3);
    }

    #[test]
    fn unreadable_list_reads_empty() {
        let (kv, images) = setup();
        kv.set("job_images_job1", "{not json").unwrap();
        let scope = ImageScope::from(&id("job1"));
        assert!(images.get_images(&scope).is_empty());
        assert_eq!(images.get_featured_image(&scope), "");
    }

    #[test]
    fn featured_falls_back_to_first_image() {
        let (kv, images) = setup();
        kv.set("job_images_job1", r#"["https://a","https://b"]"#).unwrap();
        assert_eq!(images.get_featured_image(&ImageScope::from(&id("job1"))), "https://a");
    }

    #[test]
    fn ephemeral_references_read_as_placeholder() {
        let (kv, images) = setup();
        kv.set("job_images_job1", r#"["blob:http://x/1","https://a"]"#).unwrap();
        kv.set("job_images_job2", r#"["blob:http://x/2"]"#).unwrap();
        kv.set("job_featured_image_job2", "blob:http://x/2").unwrap();

        assert_eq!(images.get_images(&ImageScope::from(&id("job1"))), strings(&["https://a"]));
        assert_eq!(
            images.get_images(&ImageScope::from(&id("job2"))),
            strings(&[DEFAULT_PLACEHOLDER])
        );
        assert_eq!(images.get_featured_image(&ImageScope::from(&id("job2"))), DEFAULT_PLACEHOLDER);
    }

    // -----------------------------------------------------------------------
    // Isolation
    // -----------------------------------------------------------------------

    #[test]
    fn clearing_one_entity_leaves_others() {
        let (_, images) = setup();
        images.save_images(&id("job1"), &strings(&["https://a"]));
        images.save_images(&id("job2"), &strings(&["https://b"]));
        images.clear_images(&id("job1"));

        assert!(images.get_images(&ImageScope::from(&id("job1"))).is_empty());
        assert_eq!(images.get_images(&ImageScope::from(&id("job2"))), strings(&["https://b"]));
        let index = images.index();
        assert!(!index.contains(&id("job1")));
        assert!(index.contains(&id("job2")));
    }

    proptest! {
        #[test]
        fn writes_to_one_entity_never_touch_another(
            a in "[a-z0-9]{1,8}",
            b in "[a-z0-9]{1,8}",
            n in 1usize..5,
        ) {
            prop_assume!(a != b && a != "latest" && b != "latest");
            let (_, images) = setup();
            let (ea, eb) = (id(&a), id(&b));
            images.save_images(&eb, &strings(&["https://b"]));

            let mut set = Vec::new();
            for i in 0..n {
                set.push(format!("https://a/{i}"));
            }
            images.save_images(&ea, &set);
            images.clear_images(&ea);

            prop_assert_eq!(images.get_images(&ImageScope::from(&eb)), strings(&["https://b"]));
            prop_assert_eq!(images.get_featured_image(&ImageScope::from(&eb)), "https://b");
            prop_assert!(images.get_images(&ImageScope::Staging).is_empty());
        }
    }

    // -----------------------------------------------------------------------
    // Staging
    // -----------------------------------------------------------------------

    #[test]
    fn finalize_moves_staging_and_is_idempotent() {
        let (kv, images) = setup();
        kv.set("job_images_latest", r#"["https://a"]"#).unwrap();
        kv.set("job_featured_image_latest", "https://a").unwrap();

        let job1 = id("job1");
        assert!(images.finalize_staged_images(&job1));
        assert!(kv.get("job_images_latest").unwrap().is_none());
        assert!(kv.get("job_featured_image_latest").unwrap().is_none());

        let scope = ImageScope::from(&job1);
        let before = (images.get_images(&scope), images.get_featured_image(&scope));
        assert!(!images.finalize_staged_images(&job1));
        assert_eq!((images.get_images(&scope), images.get_featured_image(&scope)), before);
        assert_eq!(before.0, strings(&["https://a"]));
    }

    #[test]
    fn finalize_without_staging_is_a_noop() {
        let (kv, images) = setup();
        images.save_images(&id("job1"), &strings(&["https://a"]));
        let before = kv.keys().unwrap();
        assert!(!images.finalize_staged_images(&id("job1")));
        assert_eq!(kv.keys().unwrap(), before);
    }

    struct FailingEvery2nd;

    #[async_trait]
    impl ImageCodec for FailingEvery2nd {
        async fn compress(&self, image: &str, quality: f32) -> Result<String, CodecError> {
            assert!((quality - 0.6).abs() < f32::EPSILON);
            if image.ends_with("bad") {
                Err(CodecError::Failed("boom".into()))
            } else {
                Ok(format!("{image}-c"))
            }
        }
    }

    #[tokio::test]
    async fn stage_compressed_caps_and_drops_failures() {
        let (_, images) = setup();
        let input = strings(&["https://1", "https://bad", "https://3", "https://4"]);
        let stored = images
            .stage_compressed(&ImageScope::Staging, &input, &FailingEvery2nd)
            .await;

        assert_eq!(stored.len(), 2);
        assert!(stored[0].starts_with("https://1-c#t="));
        assert!(stored[1].starts_with("https://3-c#t="));
        assert_eq!(images.get_images(&ImageScope::Staging), stored);
        assert!(images.index().staged_at.is_some());
    }

    #[tokio::test]
    async fn stage_then_finalize_into_entity() {
        let (_, images) = setup();
        let input = strings(&["data:image/png;base64,AAA"]);
        images
            .stage_compressed(&ImageScope::Staging, &input, &PassthroughCodec)
            .await;

        let job = id("job9");
        assert!(images.finalize_staged_images(&job));
        let scope = ImageScope::from(&job);
        assert_eq!(images.get_images(&scope).len(), 1);
        assert!(images.get_featured_image(&scope).starts_with("data:image/png;base64,AAA#t="));
        assert!(images.index().staged_at.is_none());
        assert!(images.index().contains(&job));
    }

    #[tokio::test]
    async fn featured_follows_a_replaced_set() {
        let (kv, images) = setup();
        let job1 = id("job1");
        let scope = ImageScope::from(&job1);
        images.save_images(&job1, &strings(&["https://old/a.png"]));

        let staged = strings(&["https://new/b.png"]);
        images
            .stage_compressed(&ImageScope::Staging, &staged, &PassthroughCodec)
            .await;
        assert!(kv.get("job_featured_image_latest").unwrap().is_none());
        assert!(images.finalize_staged_images(&job1));
        let listed = images.get_images(&scope);
        assert!(listed[0].starts_with("https://new/b.png#t="));
        assert_eq!(images.get_featured_image(&scope), listed[0]);

        images
            .stage_compressed(&scope, &strings(&["https://new/c.png"]), &PassthroughCodec)
            .await;
        let listed = images.get_images(&scope);
        assert!(listed[0].starts_with("https://new/c.png#t="));
        assert_eq!(images.get_featured_image(&scope), listed[0]);
    }

    #[tokio::test]
    async fn stage_with_all_failures_writes_nothing() {
        let (kv, images) = setup();
        let stored = images
            .stage_compressed(&ImageScope::Staging, &strings(&["blob:x"]), &PassthroughCodec)
            .await;
        assert!(stored.is_empty());
        assert!(kv.is_empty());
    }

    #[test]
    fn clear_staged_keeps_entities() {
        let (kv, images) = setup();
        images.save_images(&id("job1"), &strings(&["https://a"]));
        kv.set("job_images_latest", r#"["https://s"]"#).unwrap();
        assert!(images.has_staged());
        assert_eq!(images.clear_staged(), 1);
        assert!(!images.has_staged());
        assert!(images.get_images(&ImageScope::Staging).is_empty());
        assert_eq!(images.get_images(&ImageScope::from(&id("job1"))).len(), 1);
    }

    #[test]
    fn purge_all_removes_every_set() {
        let (kv, images) = setup();
        images.save_images(&id("job1"), &strings(&["https://a"]));
        images.save_images(&id("job2"), &strings(&["https://b"]));
        kv.set("job_images_latest", "[]").unwrap();
        kv.set("siteSettings", "{}").unwrap();

        assert_eq!(images.purge_all(), 5);
        assert_eq!(kv.keys().unwrap(), vec!["siteSettings".to_string()]);
    }

    #[test]
    fn purge_all_covers_indexed_and_unindexed_sets() {
        let (kv, images) = setup();
        images.save_images(&id("job1"), &strings(&["https://a"]));
        kv.set("job_images_legacy", r#"["https://l"]"#).unwrap();
        kv.set("job_featured_image_legacy", "https://l").unwrap();
        assert!(images.index().contains(&id("job1")));
        assert!(!images.index().contains(&id("legacy")));

        assert_eq!(images.purge_all(), 4);
        assert!(kv.is_empty());
        assert!(images.index().entities.is_empty());
    }
}
