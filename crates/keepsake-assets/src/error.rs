use std::fmt;

use keepsake_store::StoreError;
use keepsake_types::AssetKind;

/// The step of a version write that follows the version key itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStep {
    Pointer,
    Alias,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStep::Pointer => f.write_str("pointer"),
            WriteStep::Alias => f.write_str("alias"),
        }
    }
}

/// Errors from versioned asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// The version key could not be written; nothing changed.
    #[error("failed to write version {timestamp} of {kind}: {source}")]
    VersionWrite {
        kind: AssetKind,
        timestamp: u64,
        #[source]
        source: StoreError,
    },

    /// The version key was written but a later step failed.
    ///
    /// With `step == Pointer` readers still see the previous version; with
    /// `step == Alias` they see the new version but the alias is stale.
    #[error("version {timestamp} of {kind} written but the {step} write failed: {source}")]
    PartialVersion {
        kind: AssetKind,
        timestamp: u64,
        step: WriteStep,
        #[source]
        source: StoreError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type AssetResult<T> = Result<T, AssetError>;
