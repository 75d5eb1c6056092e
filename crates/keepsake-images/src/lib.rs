//! Per-entity image sets for Keepsake.
//!
//! Each entity (a job or listing) owns an ordered list of encoded images and
//! a featured image. Images picked before the entity has an id are staged
//! under the reserved pseudo-id `latest` and moved over by
//! [`EntityImageStore::finalize_staged_images`] once it does.
//!
//! # Key Types
//!
//! - [`EntityImageStore`] -- Image sets keyed by entity id
//! - [`ImageCodec`] -- External compression collaborator
//! - [`ImageIndex`] -- Entities owning image sets and the staging age
//!
//! # Design Rules
//!
//! 1. A write addressed to an entity never touches another entity's keys or
//!    the staging keys.
//! 2. `blob:` references are never written, and are replaced by the
//!    placeholder when legacy data containing them is read.
//! 3. Public operations log and degrade; they never return store errors.

pub mod codec;
pub mod error;
pub mod index;
pub mod store;

pub use codec::{CodecError, ImageCodec, PassthroughCodec};
pub use error::{ImageError, ImageResult};
pub use index::ImageIndex;
pub use store::{EntityImageStore, ImageStoreConfig, DEFAULT_PLACEHOLDER};
