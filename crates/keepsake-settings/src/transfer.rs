//! Settings import and export.
//!
//! Exported documents carry the `stored_separately` sentinel in place of
//! inline assets, so they stay small and can be shared between sites. When a
//! sentinel document is imported, the asset the importing site currently
//! uses is kept.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use keepsake_types::{AssetKind, AssetValue, SiteSettings, STORED_SEPARATELY};

use crate::error::{SettingsError, SettingsResult};
use crate::patch::SettingsPatch;
use crate::store::SettingsStore;

/// Receives an exported settings document.
pub trait ExportSink {
    fn deliver(&mut self, file_name: &str, contents: &str) -> SettingsResult<()>;
}

/// Writes exports into a directory.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far, oldest first.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ExportSink for DirectorySink {
    fn deliver(&mut self, file_name: &str, contents: &str) -> SettingsResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, contents)?;
        debug!(path = %path.display(), bytes = contents.len(), "wrote settings export");
        self.written.push(path);
        Ok(())
    }
}

/// Keeps exports in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub files: Vec<(String, String)>,
}

impl ExportSink for MemorySink {
    fn deliver(&mut self, file_name: &str, contents: &str) -> SettingsResult<()> {
        self.files.push((file_name.to_string(), contents.to_string()));
        Ok(())
    }
}

/// `site-settings-YYYY-MM-DD.json`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("site-settings-{}.json", date.format("%Y-%m-%d"))
}

impl SettingsStore {
    /// The current aggregate as a pretty-printed, sentinel-substituted
    /// document.
    pub fn export_document(&self) -> SettingsResult<String> {
        Ok(serde_json::to_string_pretty(&self.settings().offloaded())?)
    }

    /// Deliver the export document to `sink`. Returns whether it succeeded.
    pub fn export(&self, sink: &mut dyn ExportSink) -> bool {
        let file_name = export_file_name(Utc::now().date_naive());
        let result = self
            .export_document()
            .and_then(|document| sink.deliver(&file_name, &document));
        match result {
            Ok(()) => {
                info!(file = %file_name, "exported settings");
                true
            }
            Err(e) => {
                warn!(error = %e, "settings export failed");
                false
            }
        }
    }

    /// Import a settings document. Returns whether it was applied.
    ///
    /// Nothing changes when the document is not a JSON object or does not fit
    /// the settings record.
    pub fn import(&self, document: &str) -> bool {
        let result = serde_json::from_str::<Value>(document)
            .map_err(SettingsError::from)
            .and_then(|doc| self.import_value(doc));
        match result {
            Ok(()) => {
                info!("imported settings");
                true
            }
            Err(e) => {
                warn!(error = %e, "settings import rejected");
                false
            }
        }
    }

    /// Import an already parsed document.
    pub fn import_value(&self, document: Value) -> SettingsResult<()> {
        let Value::Object(mut fields) = document else {
            return Err(SettingsError::NotAnObject);
        };

        let known = known_fields()?;
        fields.retain(|field, _| {
            let keep = known.contains(field);
            if !keep {
                warn!(field = %field, "ignoring unknown field in imported settings");
            }
            keep
        });

        let current = self.settings();
        let mut reattached = Vec::new();
        for kind in AssetKind::ALL {
            let field = kind.field_name();
            if fields.get(field).and_then(Value::as_str) != Some(STORED_SEPARATELY) {
                continue;
            }
            let value = self.reattach(kind, &current);
            fields.insert(field.to_string(), Value::String(value.as_str().to_string()));
            if value != self.default_asset(kind) {
                reattached.push((kind, value));
            }
        }

        self.apply(&SettingsPatch::from_map(fields))?;

        for (kind, value) in reattached {
            if let Err(e) = self.assets().store_alias_only(kind, value.as_str()) {
                warn!(%kind, error = %e, "failed to persist re-attached asset");
            }
            if kind == AssetKind::Logo {
                self.mirror_session_logo(value.as_str());
            }
            debug!(%kind, "re-attached current asset to imported settings");
        }
        Ok(())
    }

    /// The asset to keep for a sentinel field: the live value, then the
    /// stored version, then the session mirror.
    fn reattach(&self, kind: AssetKind, current: &SiteSettings) -> AssetValue {
        let live = current.asset(kind);
        if *live != self.default_asset(kind) {
            return live.clone();
        }

        let stored = self.assets().load_stored(kind).or_else(|| match kind {
            AssetKind::Logo => self.session_logo(),
            AssetKind::Favicon => None,
        });
        stored
            .and_then(AssetValue::parse)
            .unwrap_or_else(|| live.clone())
    }
}

/// Top-level field names of the settings record.
fn known_fields() -> SettingsResult<BTreeSet<String>> {
    match serde_json::to_value(SiteSettings::<AssetValue>::default())? {
        Value::Object(fields) => Ok(fields.keys().cloned().collect()),
        _ => Err(SettingsError::NotAnObject),
    }
}
