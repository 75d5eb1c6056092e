//! Singleton assets and the references that point at them.
//!
//! The settings aggregate refers to the logo and favicon either by value (an
//! inline data URL) or by location (a URL or site path). When the aggregate is
//! persisted, inline values are offloaded to the versioned asset store and the
//! field is replaced by [`AssetRef::StoredSeparately`], which serializes as
//! the sentinel string [`STORED_SEPARATELY`].
//!
//! [`AssetValue`] is the in-memory form and cannot hold the sentinel;
//! [`AssetRef`] is the persisted form and can.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Sentinel meaning "resolve through the versioned asset store".
pub const STORED_SEPARATELY: &str = "stored_separately";

/// Fragment marker appended to image references for cache-busting.
pub const CACHE_BUST_MARKER: &str = "#t=";

/// A singleton site asset with its own versioned keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Logo,
    Favicon,
}

impl AssetKind {
    /// Every asset kind, in sweep order.
    pub const ALL: [AssetKind; 2] = [AssetKind::Logo, AssetKind::Favicon];

    /// Base name of the asset's keys in the store.
    pub fn storage_name(self) -> &'static str {
        match self {
            AssetKind::Logo => "site_logo",
            AssetKind::Favicon => "site_favicon",
        }
    }

    /// Name of the settings field holding this asset.
    pub fn field_name(self) -> &'static str {
        match self {
            AssetKind::Logo => "logo",
            AssetKind::Favicon => "favicon",
        }
    }

    /// Hardcoded asset served when nothing is stored.
    pub fn default_path(self) -> &'static str {
        match self {
            AssetKind::Logo => "/lovable-uploads/840dfb44-1c4f-4475-9321-7f361be73327.png",
            AssetKind::Favicon => "/favicon.ico",
        }
    }

    /// Largest accepted upload, in bytes.
    pub fn max_upload_bytes(self) -> usize {
        match self {
            AssetKind::Logo => 2 * 1024 * 1024,
            AssetKind::Favicon => 1024 * 1024,
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for AssetKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logo" | "site_logo" => Ok(AssetKind::Logo),
            "favicon" | "site_favicon" => Ok(AssetKind::Favicon),
            other => Err(TypeError::UnknownAssetKind(other.to_string())),
        }
    }
}

/// `data:` URL of any media type.
pub fn is_data_url(value: &str) -> bool {
    value.starts_with("data:")
}

/// `data:image/...` URL.
pub fn is_data_image(value: &str) -> bool {
    value.starts_with("data:image/")
}

/// Absolute `http://` or `https://` URL.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// In-process object reference that does not survive a reload.
pub fn is_ephemeral(value: &str) -> bool {
    value.starts_with("blob:")
}

/// An image value that may be written to the store.
pub fn is_persistable_image(value: &str) -> bool {
    !value.is_empty() && (is_data_image(value) || is_http_url(value))
}

/// Append (or replace) a `#t={timestamp}` cache-busting fragment.
///
/// ```
/// use keepsake_types::asset::cache_busted;
///
/// assert_eq!(cache_busted("https://x/y.png", 5), "https://x/y.png#t=5");
/// assert_eq!(cache_busted("https://x/y.png#t=5", 9), "https://x/y.png#t=9");
/// ```
pub fn cache_busted(value: &str, timestamp: u64) -> String {
    format!("{}{CACHE_BUST_MARKER}{timestamp}", strip_cache_bust(value))
}

/// Remove a trailing cache-busting fragment, if any.
pub fn strip_cache_bust(value: &str) -> &str {
    match value.rfind(CACHE_BUST_MARKER) {
        Some(pos) if value[pos + CACHE_BUST_MARKER.len()..].bytes().all(|b| b.is_ascii_digit()) => {
            &value[..pos]
        }
        _ => value,
    }
}

/// A resolved asset reference, as held by the in-memory aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AssetValue {
    /// Encoded image data (`data:` URL).
    Inline(String),
    /// Plain URL or site-relative path.
    External(String),
}

impl AssetValue {
    /// Classify a raw string. `None` for the sentinel.
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw == STORED_SEPARATELY {
            None
        } else if is_data_url(&raw) {
            Some(AssetValue::Inline(raw))
        } else {
            Some(AssetValue::External(raw))
        }
    }

    /// The hardcoded default for an asset kind.
    pub fn default_for(kind: AssetKind) -> Self {
        AssetValue::External(kind.default_path().to_string())
    }

    pub fn as_str(&self) -> &str {
        match self {
            AssetValue::Inline(s) | AssetValue::External(s) => s,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, AssetValue::Inline(_))
    }

    /// The persisted form: inline data is offloaded, locations are kept.
    pub fn offloaded(&self) -> AssetRef {
        match self {
            AssetValue::Inline(_) => AssetRef::StoredSeparately,
            AssetValue::External(s) => AssetRef::External(s.clone()),
        }
    }

    pub fn into_string(self) -> String {
        match self {
            AssetValue::Inline(s) | AssetValue::External(s) => s,
        }
    }
}

impl fmt::Display for AssetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AssetValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AssetValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        AssetValue::parse(raw).ok_or_else(|| {
            serde::de::Error::custom("unresolved asset reference in a hydrated aggregate")
        })
    }
}

/// An asset reference in persisted or exported form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AssetRef {
    Inline(String),
    External(String),
    /// Resolve through the versioned asset store.
    StoredSeparately,
}

impl AssetRef {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match AssetValue::parse(raw) {
            Some(value) => value.into(),
            None => AssetRef::StoredSeparately,
        }
    }

    pub fn is_stored_separately(&self) -> bool {
        matches!(self, AssetRef::StoredSeparately)
    }

    /// The resolved value, if this reference carries one.
    pub fn resolved(&self) -> Option<AssetValue> {
        match self {
            AssetRef::Inline(s) => Some(AssetValue::Inline(s.clone())),
            AssetRef::External(s) => Some(AssetValue::External(s.clone())),
            AssetRef::StoredSeparately => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AssetRef::Inline(s) | AssetRef::External(s) => s,
            AssetRef::StoredSeparately => STORED_SEPARATELY,
        }
    }
}

impl From<AssetValue> for AssetRef {
    fn from(value: AssetValue) -> Self {
        match value {
            AssetValue::Inline(s) => AssetRef::Inline(s),
            AssetValue::External(s) => AssetRef::External(s),
        }
    }
}

impl Serialize for AssetRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AssetRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(AssetRef::parse(String::deserialize(deserializer)?))
    }
}
