//! Foundation types for Keepsake.
//!
//! Keepsake is the persistence core of the site administration layer: it keeps
//! site settings, the versioned logo and favicon, per-listing image sets and
//! the listing collection in a flat, string-keyed store. Every other Keepsake
//! crate depends on `keepsake-types`.
//!
//! # Key Types
//!
//! - [`EntityId`] -- Permanent identifier of an entity owning an image set
//! - [`ImageScope`] -- Either a permanent entity or the staging area
//! - [`AssetKind`] -- The singleton assets (logo, favicon)
//! - [`AssetValue`] / [`AssetRef`] -- In-memory and persisted asset references
//! - [`SiteSettings`] -- The settings aggregate
//! - [`Listing`] -- A listing record
//!
//! The [`keys`] module is the single owner of the persisted key layout.

pub mod asset;
pub mod error;
pub mod keys;
pub mod listing;
pub mod settings;
pub mod temporal;

pub use asset::{AssetKind, AssetRef, AssetValue, STORED_SEPARATELY};
pub use error::TypeError;
pub use keys::{EntityId, ImageScope};
pub use listing::{Host, Listing, NewListing};
pub use settings::{
    CompanyInfo, FooterSettings, NotificationSettings, ReservationSettings, SiteSettings,
    SocialLinks,
};
pub use temporal::wall_clock_ms;
