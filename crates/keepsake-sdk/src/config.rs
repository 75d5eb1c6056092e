use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use keepsake_assets::AssetDefaults;
use keepsake_images::ImageStoreConfig;
use keepsake_settings::DEFAULT_FALLBACK_LEN;
use keepsake_types::AssetKind;

use crate::error::SdkResult;

/// Everything a [`Keepsake`](crate::Keepsake) handle is built from.
///
/// Every section falls back to its defaults, so an empty TOML document is a
/// valid configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepsakeConfig {
    pub store: StoreConfig,
    pub assets: AssetDefaults,
    pub images: ImageStoreConfig,
    pub uploads: UploadConfig,
    pub display: DisplayConfig,
    pub settings: SettingsConfig,
    pub gc: GcConfig,
}

impl KeepsakeConfig {
    pub fn from_toml_str(raw: &str) -> SdkResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: &Path) -> SdkResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// File holding the persistent key space.
    pub path: PathBuf,
    /// File holding the session key space. In memory when unset.
    pub session_path: Option<PathBuf>,
    /// Capacity in UTF-16 code units of keys plus values.
    pub quota: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("keepsake.json"),
            session_path: None,
            quota: Some(5 * 1024 * 1024),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub logo_max_bytes: usize,
    pub favicon_max_bytes: usize,
    /// Quality passed to the codec for single-image uploads.
    pub quality: f32,
}

impl UploadConfig {
    pub fn max_bytes(&self, kind: AssetKind) -> usize {
        match kind {
            AssetKind::Logo => self.logo_max_bytes,
            AssetKind::Favicon => self.favicon_max_bytes,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            logo_max_bytes: AssetKind::Logo.max_upload_bytes(),
            favicon_max_bytes: AssetKind::Favicon.max_upload_bytes(),
            quality: 0.7,
        }
    }
}

/// Shown when an asset has no usable display value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub logo_placeholder: String,
    pub favicon_placeholder: String,
}

impl DisplayConfig {
    pub fn placeholder(&self, kind: AssetKind) -> &str {
        match kind {
            AssetKind::Logo => &self.logo_placeholder,
            AssetKind::Favicon => &self.favicon_placeholder,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            logo_placeholder: "/placeholder.svg".into(),
            favicon_placeholder: "/favicon.ico".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Characters kept when an asset only fits in reduced form.
    pub fallback_len: usize,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            fallback_len: DEFAULT_FALLBACK_LEN,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Staging sets older than this are swept.
    pub staging_ttl_secs: u64,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            staging_ttl_secs: 24 * 60 * 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = KeepsakeConfig::default();
        assert_eq!(c.store.path, PathBuf::from("keepsake.json"));
        assert!(c.store.session_path.is_none());
        assert_eq!(c.images.max_images, 3);
        assert_eq!(c.images.quality, 0.6);
        assert_eq!(c.uploads.quality, 0.7);
        assert_eq!(c.uploads.max_bytes(AssetKind::Logo), 2 * 1024 * 1024);
        assert_eq!(c.uploads.max_bytes(AssetKind::Favicon), 1024 * 1024);
        assert_eq!(c.settings.fallback_len, 1_000_000);
        assert_eq!(c.display.placeholder(AssetKind::Logo), "/placeholder.svg");
        assert_eq!(c.display.placeholder(AssetKind::Favicon), "/favicon.ico");
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(KeepsakeConfig::from_toml_str("").unwrap(), KeepsakeConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let c = KeepsakeConfig::from_toml_str(
            r#"
            [store]
            path = "/var/lib/keepsake/site.json"
            quota = 1024

            [images]
            max_images = 5

            [gc]
            staging_ttl_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(c.store.path, PathBuf::from("/var/lib/keepsake/site.json"));
        assert_eq!(c.store.quota, Some(1024));
        assert_eq!(c.images.max_images, 5);
        assert_eq!(c.images.quality, 0.6);
        assert_eq!(c.gc.staging_ttl_secs, 60);
        assert_eq!(c.assets, AssetDefaults::default());
    }

    #[test]
    fn ill_typed_document_is_rejected() {
        let err = KeepsakeConfig::from_toml_str("[images]\nmax_images = \"many\"").unwrap_err();
        assert!(matches!(err, crate::SdkError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keepsake.toml");
        std::fs::write(&path, "[assets]\nlogo = \"/brand.png\"\n").unwrap();

        let c = KeepsakeConfig::load(&path).unwrap();
        assert_eq!(c.assets.logo, "/brand.png");
        assert_eq!(c.assets.favicon, "/favicon.ico");
        assert!(matches!(
            KeepsakeConfig::load(&dir.path().join("missing.toml")),
            Err(crate::SdkError::Io(_))
        ));
    }
}
