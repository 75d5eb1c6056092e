use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use keepsake_assets::{VersionScan, VersionedAssetStore};
use keepsake_images::EntityImageStore;
use keepsake_types::{wall_clock_ms, AssetKind};

/// What a sweep may remove.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepPolicy {
    /// Staging sets written before this wall-clock time (ms) are removed.
    /// `None` leaves staging alone.
    pub staging_cutoff_ms: Option<u64>,
    /// Walk every key instead of trusting the indexes.
    pub full_scan: bool,
}

impl SweepPolicy {
    /// Remove staging sets older than `age`.
    pub fn staging_older_than(age: Duration) -> Self {
        let age_ms = u64::try_from(age.as_millis()).unwrap_or(u64::MAX);
        Self {
            staging_cutoff_ms: Some(wall_clock_ms().saturating_sub(age_ms)),
            full_scan: false,
        }
    }

    pub fn with_full_scan(mut self) -> Self {
        self.full_scan = true;
        self
    }
}

/// Outcome of a sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub staging_removed: usize,
    pub versions_removed: BTreeMap<AssetKind, usize>,
    /// Kinds left untouched because they have no current pointer.
    pub skipped: Vec<AssetKind>,
}

impl SweepReport {
    pub fn total_removed(&self) -> usize {
        self.staging_removed + self.versions_removed.values().sum::<usize>()
    }
}

/// Removes superseded entries from the image and asset stores.
pub struct GarbageCollector {
    images: Arc<EntityImageStore>,
    assets: Arc<VersionedAssetStore>,
}

impl GarbageCollector {
    pub fn new(images: Arc<EntityImageStore>, assets: Arc<VersionedAssetStore>) -> Self {
        Self { images, assets }
    }

    pub fn sweep(&self, policy: &SweepPolicy) -> SweepReport {
        let mut report = SweepReport::default();

        if let Some(cutoff) = policy.staging_cutoff_ms {
            report.staging_removed = self.sweep_staging(cutoff, policy.full_scan);
        }

        let scan = if policy.full_scan {
            VersionScan::Full
        } else {
            VersionScan::Indexed
        };
        for kind in AssetKind::ALL {
            if self.assets.current_version(kind).is_none() {
                debug!(%kind, "no current pointer; skipping");
                report.skipped.push(kind);
                continue;
            }
            report.versions_removed.insert(kind, self.assets.prune(kind, scan));
        }

        info!(
            staging = report.staging_removed,
            versions = report.total_removed() - report.staging_removed,
            full_scan = policy.full_scan,
            "sweep finished"
        );
        report
    }

    /// Staging keys whose age is unknown (written before the index existed)
    /// are only removed by a full scan.
    fn sweep_staging(&self, cutoff: u64, full_scan: bool) -> usize {
        if !self.images.has_staged() {
            return 0;
        }
        let index = self.images.index();
        let stale = match index.staged_at {
            Some(_) => index.staged_before(cutoff),
            None => full_scan,
        };
        if !stale {
            debug!(staged_at = ?index.staged_at, cutoff, "staging set is fresh");
            return 0;
        }
        self.images.clear_staged()
    }
}

impl std::fmt::Debug for GarbageCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GarbageCollector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsake_images::PassthroughCodec;
    use keepsake_store::{InMemoryKvStore, KvStore};
    use keepsake_types::ImageScope;

    struct Harness {
        kv: Arc<InMemoryKvStore>,
        images: Arc<EntityImageStore>,
        assets: Arc<VersionedAssetStore>,
        gc: GarbageCollector,
    }

    fn harness() -> Harness {
        let kv = Arc::new(InMemoryKvStore::new());
        let images = Arc::new(EntityImageStore::new(kv.clone()));
        let assets = Arc::new(VersionedAssetStore::new(kv.clone()));
        let gc = GarbageCollector::new(images.clone(), assets.clone());
        Harness { kv, images, assets, gc }
    }

    async fn stage(h: &Harness) {
        let images = vec!["https://staged".to_string()];
        h.images
            .stage_compressed(&ImageScope::Staging, &images, &PassthroughCodec)
            .await;
    }

    #[test]
    fn prunes_superseded_versions_only() {
        let h = harness();
        h.assets.store_asset(AssetKind::Logo, "v1").unwrap();
        h.assets.store_asset(AssetKind::Logo, "v2").unwrap();

        let report = h.gc.sweep(&SweepPolicy::default());
        assert_eq!(report.versions_removed.get(&AssetKind::Logo), Some(&1));
        assert_eq!(report.skipped, vec![AssetKind::Favicon]);
        assert_eq!(h.assets.load_asset(AssetKind::Logo), "v2");
        assert!(h.kv.get("site_logo").unwrap().is_some());
        assert!(h.kv.get("site_logo_timestamp").unwrap().is_some());
    }

    #[test]
    fn kind_without_pointer_is_untouched() {
        let h = harness();
        h.kv.set("site_favicon_100", "a").unwrap();
        h.kv.set("site_favicon_200", "b").unwrap();
        h.kv.set("site_favicon", "b").unwrap();

        let report = h.gc.sweep(&SweepPolicy::default().with_full_scan());
        assert_eq!(report.total_removed(), 0);
        assert_eq!(h.kv.len(), 3);
    }

    #[test]
    fn full_scan_finds_unindexed_versions() {
        let h = harness();
        h.assets.store_asset(AssetKind::Favicon, "current").unwrap();
        h.kv.set("site_favicon_5", "legacy").unwrap();

        assert_eq!(h.gc.sweep(&SweepPolicy::default()).total_removed(), 0);
        assert_eq!(h.gc.sweep(&SweepPolicy::default().with_full_scan()).total_removed(), 1);
        assert!(h.kv.get("site_favicon_5").unwrap().is_none());
        assert_eq!(h.assets.load_asset(AssetKind::Favicon), "current");
    }

    #[test]
    fn pending_version_survives_full_scan() {
        let h = harness();
        let current = h.assets.store_asset(AssetKind::Logo, "current").unwrap();
        let pending = format!("site_logo_{}", current + 1000);
        h.kv.set(&pending, "pending").unwrap();

        let report = h.gc.sweep(&SweepPolicy::default().with_full_scan());
        assert_eq!(report.versions_removed.get(&AssetKind::Logo), Some(&0));
        assert_eq!(h.kv.get(&pending).unwrap().as_deref(), Some("pending"));
        assert_eq!(h.assets.load_asset(AssetKind::Logo), "current");
    }

    #[tokio::test]
    async fn stale_staging_is_removed() {
        let h = harness();
        stage(&h).await;
        let policy = SweepPolicy {
            staging_cutoff_ms: Some(u64::MAX),
            full_scan: false,
        };
        assert_eq!(h.gc.sweep(&policy).staging_removed, 1);
        assert!(!h.images.has_staged());
    }

    #[tokio::test]
    async fn fresh_staging_is_kept() {
        let h = harness();
        stage(&h).await;
        let report = h.gc.sweep(&SweepPolicy::staging_older_than(Duration::from_secs(3600)));
        assert_eq!(report.staging_removed, 0);
        assert!(h.images.has_staged());

        // No cutoff at all leaves staging alone too.
        assert_eq!(h.gc.sweep(&SweepPolicy::default()).staging_removed, 0);
    }

    #[test]
    fn staging_of_unknown_age_needs_full_scan() {
        let h = harness();
        h.kv.set("job_images_latest", r#"["https://old"]"#).unwrap();
        h.kv.set("job_featured_image_latest", "https://old").unwrap();
        let cutoff = SweepPolicy::staging_older_than(Duration::ZERO);

        assert_eq!(h.gc.sweep(&cutoff).staging_removed, 0);
        assert_eq!(h.gc.sweep(&cutoff.with_full_scan()).staging_removed, 2);
    }

    #[test]
    fn entity_sets_are_never_swept() {
        let h = harness();
        let id = keepsake_types::EntityId::new("job1").unwrap();
        h.images.save_images(&id, &["https://a".to_string()]);
        let policy = SweepPolicy {
            staging_cutoff_ms: Some(u64::MAX),
            full_scan: true,
        };
        h.gc.sweep(&policy);
        assert_eq!(h.images.get_images(&ImageScope::from(&id)).len(), 1);
    }
}
