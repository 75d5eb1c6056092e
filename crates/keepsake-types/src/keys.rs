//! Persisted key layout.
//!
//! The underlying store never enforces ownership of a key: a key belongs to a
//! component purely because its name follows that component's convention. All
//! conventions live here so that no component formats a key by hand.
//!
//! | Key | Owner |
//! |---|---|
//! | `siteSettings` | settings aggregate |
//! | `site_logo`, `site_logo_timestamp`, `site_logo_{ts}` | logo versions |
//! | `site_favicon`, `site_favicon_timestamp`, `site_favicon_{ts}` | favicon versions |
//! | `job_images_{id}`, `job_featured_image_{id}` | per-entity image set |
//! | `job_images_latest`, `job_featured_image_latest` | staging image set |
//! | `current_logo` (session store) | same-tab logo mirror |
//! | `listings` | listing collection |
//! | `keepsake_index_*` | sweep indexes |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::asset::AssetKind;
use crate::error::TypeError;

/// Key of the serialized settings aggregate.
pub const SETTINGS_KEY: &str = "siteSettings";

/// Key of the serialized listing collection.
pub const LISTINGS_KEY: &str = "listings";

/// Session-store key mirroring the active logo for the current tab.
pub const SESSION_LOGO_KEY: &str = "current_logo";

/// Reserved pseudo-identifier of the staging image set.
pub const STAGING_ID: &str = "latest";

/// Prefix of per-entity image lists.
pub const IMAGES_PREFIX: &str = "job_images_";

/// Prefix of per-entity featured images.
pub const FEATURED_PREFIX: &str = "job_featured_image_";

/// Prefix shared by every sweep index.
pub const INDEX_PREFIX: &str = "keepsake_index_";

/// Characters that are forbidden anywhere in an entity identifier.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r'];

/// Permanent identifier of an entity that owns an image set.
///
/// An `EntityId` can never name the staging area: `"latest"` is rejected at
/// construction, so a write addressed to an `EntityId` cannot land on a
/// shared staging key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Validate and wrap an identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use keepsake_types::EntityId;
    ///
    /// assert!(EntityId::new("job1").is_ok());
    /// assert!(EntityId::new("").is_err());
    /// assert!(EntityId::new("latest").is_err());
    /// ```
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidEntityId {
                id,
                reason: "entity id must not be empty".into(),
            });
        }
        if id == STAGING_ID {
            return Err(TypeError::InvalidEntityId {
                id,
                reason: "reserved for the staging area".into(),
            });
        }
        if let Some(ch) = id.chars().find(|c| FORBIDDEN_CHARS.contains(c) || c.is_control()) {
            return Err(TypeError::InvalidEntityId {
                id,
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EntityId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where an image set lives: under a permanent entity or in staging.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImageScope {
    /// Images uploaded before the owning entity has an identifier.
    Staging,
    /// Images bound to a permanent entity.
    Entity(EntityId),
}

impl ImageScope {
    /// The key suffix for this scope.
    pub fn suffix(&self) -> &str {
        match self {
            ImageScope::Staging => STAGING_ID,
            ImageScope::Entity(id) => id.as_str(),
        }
    }

    pub fn is_staging(&self) -> bool {
        matches!(self, ImageScope::Staging)
    }
}

impl From<EntityId> for ImageScope {
    fn from(id: EntityId) -> Self {
        ImageScope::Entity(id)
    }
}

impl From<&EntityId> for ImageScope {
    fn from(id: &EntityId) -> Self {
        ImageScope::Entity(id.clone())
    }
}

/// `job_images_{scope}`.
pub fn images_key(scope: &ImageScope) -> String {
    format!("{IMAGES_PREFIX}{}", scope.suffix())
}

/// `job_featured_image_{scope}`.
pub fn featured_key(scope: &ImageScope) -> String {
    format!("{FEATURED_PREFIX}{}", scope.suffix())
}

/// Index of entity ids owning image sets, plus staging metadata.
pub fn image_index_key() -> String {
    format!("{INDEX_PREFIX}job_images")
}

/// Returns `true` if `key` belongs to the image-store naming convention.
///
/// Index keys are not part of the convention; they are owned by the sweep
/// machinery.
pub fn is_image_key(key: &str) -> bool {
    key.starts_with(IMAGES_PREFIX) || key.starts_with(FEATURED_PREFIX)
}

/// Extract the scope suffix of an image-store key.
pub fn image_key_suffix(key: &str) -> Option<&str> {
    key.strip_prefix(IMAGES_PREFIX)
        .or_else(|| key.strip_prefix(FEATURED_PREFIX))
        .filter(|s| !s.is_empty())
}

/// Alias key of an asset, e.g. `site_logo`.
pub fn asset_alias_key(kind: AssetKind) -> &'static str {
    kind.storage_name()
}

/// Current-version pointer of an asset, e.g. `site_logo_timestamp`.
pub fn asset_pointer_key(kind: AssetKind) -> String {
    format!("{}_timestamp", kind.storage_name())
}

/// Versioned value key, e.g. `site_logo_1700000000000`.
pub fn asset_version_key(kind: AssetKind, timestamp: u64) -> String {
    format!("{}_{timestamp}", kind.storage_name())
}

/// Index of known version timestamps for an asset.
pub fn asset_index_key(kind: AssetKind) -> String {
    format!("{INDEX_PREFIX}{}", kind.storage_name())
}

/// Parse the timestamp out of a versioned asset key.
///
/// Only all-digit suffixes are versions, so the pointer key
/// (`site_logo_timestamp`) and the alias key are never mistaken for one.
///
/// ```
/// use keepsake_types::AssetKind;
/// use keepsake_types::keys::parse_asset_version;
///
/// assert_eq!(parse_asset_version(AssetKind::Logo, "site_logo_42"), Some(42));
/// assert_eq!(parse_asset_version(AssetKind::Logo, "site_logo_timestamp"), None);
/// assert_eq!(parse_asset_version(AssetKind::Logo, "site_logo"), None);
/// ```
pub fn parse_asset_version(kind: AssetKind, key: &str) -> Option<u64> {
    let rest = key.strip_prefix(kind.storage_name())?.strip_prefix('_')?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str) -> ImageScope {
        ImageScope::Entity(EntityId::new(id).unwrap())
    }

    #[test]
    fn valid_entity_ids() {
        assert!(EntityId::new("job1").is_ok());
        assert!(EntityId::new("k3j9x2abc").is_ok());
        assert!(EntityId::new("0191b7a2-7cde-7000-8000-000000000000").is_ok());
    }

    #[test]
    fn reject_staging_id() {
        let err = EntityId::new("latest").unwrap_err();
        assert!(matches!(err, TypeError::InvalidEntityId { .. }));
    }

    #[test]
    fn reject_whitespace_and_control() {
        assert!(EntityId::new("has space").is_err());
        assert!(EntityId::new("tab\there").is_err());
        assert!(EntityId::new("nul\u{0}").is_err());
    }

    #[test]
    fn entity_id_serde_validates() {
        let ok: EntityId = serde_json::from_str("\"job7\"").unwrap();
        assert_eq!(ok.as_str(), "job7");
        assert!(serde_json::from_str::<EntityId>("\"latest\"").is_err());
    }

    #[test]
    fn image_keys_follow_convention() {
        assert_eq!(images_key(&entity("job1")), "job_images_job1");
        assert_eq!(featured_key(&entity("job1")), "job_featured_image_job1");
        assert_eq!(images_key(&ImageScope::Staging), "job_images_latest");
        assert_eq!(featured_key(&ImageScope::Staging), "job_featured_image_latest");
    }

    #[test]
    fn image_key_detection() {
        assert!(is_image_key("job_images_a"));
        assert!(is_image_key("job_featured_image_a"));
        assert!(!is_image_key("site_logo"));
        assert!(!is_image_key(&image_index_key()));
        assert_eq!(image_key_suffix("job_images_a"), Some("a"));
        assert_eq!(image_key_suffix("job_featured_image_latest"), Some("latest"));
        assert_eq!(image_key_suffix("job_images_"), None);
    }

    #[test]
    fn asset_keys_follow_convention() {
        assert_eq!(asset_alias_key(AssetKind::Logo), "site_logo");
        assert_eq!(asset_pointer_key(AssetKind::Favicon), "site_favicon_timestamp");
        assert_eq!(asset_version_key(AssetKind::Logo, 17), "site_logo_17");
    }

    #[test]
    fn version_parsing_ignores_other_kinds() {
        assert_eq!(parse_asset_version(AssetKind::Favicon, "site_logo_17"), None);
        assert_eq!(parse_asset_version(AssetKind::Logo, "site_logo_17x"), None);
        assert_eq!(parse_asset_version(AssetKind::Logo, "site_logo_"), None);
    }

    proptest::proptest! {
        #[test]
        fn distinct_entities_never_share_keys(a in "[a-z0-9]{1,12}", b in "[a-z0-9]{1,12}") {
            proptest::prop_assume!(a != b && a != STAGING_ID && b != STAGING_ID);
            let (a, b) = (entity(&a), entity(&b));
            proptest::prop_assert_ne!(images_key(&a), images_key(&b));
            proptest::prop_assert_ne!(featured_key(&a), featured_key(&b));
            let key = images_key(&a);
            proptest::prop_assert_eq!(image_key_suffix(&key), Some(a.suffix()));
        }

        #[test]
        fn version_keys_parse_back(ts in proptest::num::u64::ANY) {
            for kind in AssetKind::ALL {
                let key = asset_version_key(kind, ts);
                proptest::prop_assert_eq!(parse_asset_version(kind, &key), Some(ts));
            }
        }
    }
}
