//! Versioned singleton assets for Keepsake.
//!
//! The site has exactly one logo and one favicon. Browsers cache images by
//! URL aggressively, so every stored version gets its own timestamped key and
//! a pointer names the current one:
//!
//! ```text
//! site_logo_1718000000000   version value
//! site_logo_1718000004321   version value   <- current
//! site_logo_timestamp       "1718000004321"
//! site_logo                 alias of the current value
//! keepsake_index_site_logo  [1718000000000, 1718000004321]
//! ```
//!
//! # Write Order
//!
//! `store_asset` writes the version key, the index, the pointer, then the
//! alias. The store has no transactions; a failure between steps leaves a new
//! version readable only once the pointer moves. Readers prefer the pointer,
//! then the alias, then the hardcoded default. The next successful write
//! resolves any partial state, and pruning removes the orphan version.

pub mod clock;
pub mod error;
pub mod store;

pub use clock::VersionClock;
pub use error::{AssetError, AssetResult, WriteStep};
pub use store::{AssetDefaults, VersionScan, VersionedAssetStore};
