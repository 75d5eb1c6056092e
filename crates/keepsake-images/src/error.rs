use keepsake_store::StoreError;

/// Errors from image set operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("malformed image list at {key}: {reason}")]
    Malformed { key: String, reason: String },
}

pub type ImageResult<T> = Result<T, ImageError>;
