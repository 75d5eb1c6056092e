//! Listing records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::keys::EntityId;

/// Host shown on a listing card.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Host {
    pub name: String,
    pub image: String,
}

impl Host {
    pub const DEFAULT_NAME: &'static str = "Hôte";
    pub const DEFAULT_IMAGE: &'static str = "/placeholder.svg";
}

impl Default for Host {
    fn default() -> Self {
        Self {
            name: Self::DEFAULT_NAME.into(),
            image: Self::DEFAULT_IMAGE.into(),
        }
    }
}

/// A stored listing.
///
/// Fields this crate does not model are kept in `extra` so that a
/// read-modify-write of the collection never drops them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: EntityId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub host: Host,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub dates: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Listing {
    /// Fill derived and defaulted fields.
    ///
    /// - `image` comes from `images[0]` when absent or empty.
    /// - A blank host name or picture falls back to the default host.
    pub fn normalize(mut self) -> Self {
        if self.image.as_deref().map_or(true, str::is_empty) {
            self.image = self.images.first().cloned();
        }
        if self.host.name.trim().is_empty() {
            self.host.name = Host::DEFAULT_NAME.into();
        }
        if self.host.image.trim().is_empty() {
            self.host.image = Host::DEFAULT_IMAGE.into();
        }
        self
    }
}

/// A listing that has not been assigned an identifier yet.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub host: Option<Host>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NewListing {
    /// Bind to an identifier. Rating starts at zero.
    pub fn into_listing(self, id: EntityId, dates: String) -> Listing {
        Listing {
            id,
            title: self.title,
            description: self.description,
            location: self.location,
            price: self.price,
            host: self.host.unwrap_or_default(),
            rating: 0.0,
            dates,
            images: self.images,
            image: self.image,
            extra: self.extra,
        }
        .normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(images: &[&str], image: Option<&str>) -> Listing {
        Listing {
            id: EntityId::new("l1").unwrap(),
            title: "Studio".into(),
            description: String::new(),
            location: "Lomé".into(),
            price: 100.0,
            host: Host::default(),
            rating: 0.0,
            dates: String::new(),
            images: images.iter().map(|s| s.to_string()).collect(),
            image: image.map(str::to_string),
            extra: Map::new(),
        }
    }

    #[test]
    fn normalize_fills_image_from_first() {
        let l = listing(&["https://a/1.png", "https://a/2.png"], None).normalize();
        assert_eq!(l.image.as_deref(), Some("https://a/1.png"));
    }

    #[test]
    fn normalize_keeps_explicit_image() {
        let l = listing(&["https://a/1.png"], Some("https://a/main.png")).normalize();
        assert_eq!(l.image.as_deref(), Some("https://a/main.png"));
    }

    #[test]
    fn normalize_replaces_blank_host() {
        let mut l = listing(&[], None);
        l.host = Host {
            name: "  ".into(),
            image: String::new(),
        };
        let l = l.normalize();
        assert_eq!(l.host, Host::default());
        assert!(l.image.is_none());
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let raw = r#"{"id":"l9","title":"T","bedrooms":3}"#;
        let l: Listing = serde_json::from_str(raw).unwrap();
        assert_eq!(l.extra["bedrooms"], 3);
        let back = serde_json::to_value(&l).unwrap();
        assert_eq!(back["bedrooms"], 3);
    }

    #[test]
    fn new_listing_gets_default_host() {
        let l = NewListing {
            title: "Villa".into(),
            images: vec!["https://a/1.png".into()],
            ..Default::default()
        }
        .into_listing(EntityId::new("abc").unwrap(), "01/01/2026".into());
        assert_eq!(l.host, Host::default());
        assert_eq!(l.rating, 0.0);
        assert_eq!(l.image.as_deref(), Some("https://a/1.png"));
    }
}
