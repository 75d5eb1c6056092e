use keepsake_store::StoreError;
use keepsake_types::TypeError;

/// Errors from listing operations.
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid listing id: {0}")]
    InvalidId(#[from] TypeError),
}

pub type ListingResult<T> = Result<T, ListingError>;
