//! High-level API for Keepsake.
//!
//! [`Keepsake`] wires one persistent store and one session store into every
//! component and exposes the operations an admin surface triggers. This is
//! the main entry point for applications embedding Keepsake.
//!
//! # Key Types
//!
//! - [`Keepsake`] -- the facade
//! - [`KeepsakeConfig`] -- TOML-loadable configuration
//! - [`Notifier`] -- receives the outcome of user-triggered mutations

pub mod config;
pub mod error;
pub mod keepsake;
pub mod notify;

pub use config::{DisplayConfig, GcConfig, KeepsakeConfig, SettingsConfig, StoreConfig, UploadConfig};
pub use error::{SdkError, SdkResult};
pub use keepsake::Keepsake;
pub use notify::{Notice, Notifier, RecordingNotifier, TracingNotifier};

// Re-export key types
pub use keepsake_gc::{SweepPolicy, SweepReport};
pub use keepsake_images::{ImageCodec, PassthroughCodec};
pub use keepsake_settings::{DirectorySink, ExportSink, MemorySink, SettingsPatch};
pub use keepsake_types::{AssetKind, EntityId, ImageScope, Listing, NewListing, SiteSettings};
