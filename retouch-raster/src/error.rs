//! Raster error types.

use retouch_core::EditorError;
use thiserror::Error;

/// Result type for raster operations.
pub type RasterResult<T> = Result<T, RasterError>;

/// Errors that can occur while decoding or encoding pixels.
#[derive(Debug, Error)]
pub enum RasterError {
    /// Image bytes could not be decoded.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Pixels could not be encoded.
    #[error("Failed to encode image: {0}")]
    Encode(String),
}

impl From<RasterError> for EditorError {
    fn from(err: RasterError) -> Self {
        Self::Surface(err.to_string())
    }
}
