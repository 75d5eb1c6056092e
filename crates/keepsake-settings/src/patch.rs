use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use keepsake_types::SiteSettings;

use crate::error::{SettingsError, SettingsResult};

const DARK_MODE_FIELD: &str = "darkMode";

/// A partial update of the settings record, keyed by camelCase field name.
///
/// Top-level fields replace; when both the current value and the patch value
/// are objects (the nested sub-records), the patch's keys replace the current
/// keys one level deep and the rest are kept.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsPatch(Map<String, Value>);

impl SettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> SettingsResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            _ => Err(SettingsError::NotAnObject),
        }
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge into `base` and type-check the result.
    ///
    /// Unknown top-level fields and values that do not fit their field are
    /// errors; `base` is never modified.
    pub fn apply_to(&self, base: &SiteSettings) -> SettingsResult<SiteSettings> {
        let Value::Object(mut doc) = serde_json::to_value(base)? else {
            return Err(SettingsError::NotAnObject);
        };

        for (field, value) in &self.0 {
            match doc.get_mut(field) {
                Some(Value::Object(current)) if value.is_object() => {
                    if let Value::Object(nested) = value {
                        for (k, v) in nested {
                            current.insert(k.clone(), v.clone());
                        }
                    }
                }
                Some(current) => *current = value.clone(),
                None => return Err(SettingsError::UnknownField(field.clone())),
            }
        }
        doc.insert(DARK_MODE_FIELD.to_string(), Value::Bool(false));

        let mut merged: SiteSettings = serde_json::from_value(Value::Object(doc))
            .map_err(|e| SettingsError::InvalidPatch(e.to_string()))?;
        merged.dark_mode = false;
        Ok(merged)
    }
}

impl From<SettingsPatch> for Value {
    fn from(patch: SettingsPatch) -> Self {
        Value::Object(patch.0)
    }
}
