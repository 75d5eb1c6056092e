//! Site settings aggregate for Keepsake.
//!
//! [`SettingsStore`] owns the one in-memory [`SiteSettings`] record. It is
//! persisted under `siteSettings` after every change, with inline logo and
//! favicon data offloaded to the versioned asset store and replaced by the
//! `stored_separately` sentinel. Loading reverses the substitution.
//!
//! # Key Types
//!
//! - [`SettingsStore`] -- Load, patch, persist and reset the aggregate
//! - [`SettingsPatch`] -- Partial update, merged one level deep
//! - [`ExportSink`] -- Destination of an exported settings document
//!
//! # Design Rules
//!
//! 1. Loading never fails; anything unreadable is replaced by its default.
//! 2. A patch either applies completely or not at all.
//! 3. Dark mode is off after every load and every update.
//!
//! [`SiteSettings`]: keepsake_types::SiteSettings

pub mod error;
pub mod patch;
pub mod store;
pub mod transfer;

pub use error::{SettingsError, SettingsResult};
pub use patch::SettingsPatch;
pub use store::{SettingsStore, DEFAULT_FALLBACK_LEN};
pub use transfer::{export_file_name, DirectorySink, ExportSink, MemorySink};
