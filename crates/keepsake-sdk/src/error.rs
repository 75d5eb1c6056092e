use keepsake_types::AssetKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("{kind} upload is {size} bytes; the limit is {limit}")]
    UploadTooLarge {
        kind: AssetKind,
        size: usize,
        limit: usize,
    },

    #[error("{kind} upload is empty")]
    EmptyUpload { kind: AssetKind },

    #[error("unsupported media type for {kind}: {media_type}")]
    UnsupportedMediaType { kind: AssetKind, media_type: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] keepsake_store::StoreError),

    #[error("settings error: {0}")]
    Settings(#[from] keepsake_settings::SettingsError),

    #[error("listing error: {0}")]
    Listing(#[from] keepsake_listings::ListingError),

    #[error("codec error: {0}")]
    Codec(#[from] keepsake_images::CodecError),
}

pub type SdkResult<T> = Result<T, SdkError>;
