use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid entity id {id:?}: {reason}")]
    InvalidEntityId { id: String, reason: String },

    #[error("unknown asset kind: {0}")]
    UnknownAssetKind(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
