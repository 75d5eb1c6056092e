//! Listing collection for Keepsake.
//!
//! All listings live in one JSON array under the `listings` key; every
//! mutation reads the whole collection, changes it and writes it back.
//! Images are not embedded in the collection's source of truth: each listing
//! owns an image set in [`keepsake_images`], and [`ListingStore::hydrate`]
//! restores the listing's images from it.

pub mod error;
pub mod id;
pub mod store;

pub use error::{ListingError, ListingResult};
pub use id::generate_id;
pub use store::ListingStore;
