use keepsake_store::StoreError;

/// Errors from settings operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings document is not a JSON object")]
    NotAnObject,

    #[error("unknown settings field: {0}")]
    UnknownField(String),

    #[error("patch does not fit the settings record: {0}")]
    InvalidPatch(String),

    #[error("malformed settings document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("export failed: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type SettingsResult<T> = Result<T, SettingsError>;
