use async_trait::async_trait;

use keepsake_types::asset::is_persistable_image;

/// Errors reported by an [`ImageCodec`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("unsupported image source: {0}")]
    Unsupported(String),

    #[error("compression failed: {0}")]
    Failed(String),
}

/// Compresses an encoded image to the given quality in `0.0..=1.0`.
///
/// Compression is the only asynchronous step in Keepsake. It is not
/// cancellable; a result that arrives late is simply written as a newer
/// value.
#[async_trait]
pub trait ImageCodec: Send + Sync {
    async fn compress(&self, image: &str, quality: f32) -> Result<String, CodecError>;
}

/// Returns persistable images unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughCodec;

#[async_trait]
impl ImageCodec for PassthroughCodec {
    async fn compress(&self, image: &str, _quality: f32) -> Result<String, CodecError> {
        if is_persistable_image(image) {
            Ok(image.to_string())
        } else {
            Err(CodecError::Unsupported(truncate(image, 32)))
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
