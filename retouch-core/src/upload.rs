//! Upload validation.
//!
//! Uploaded files MUST pass [`ImageUpload::validate`] before anything touches
//! the surface or the history.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, EditorResult};
use crate::history::Snapshot;

/// Maximum accepted upload size (10 MB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Image formats accepted at the upload boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadFormat {
    /// JPEG.
    Jpeg,
    /// PNG.
    Png,
    /// GIF.
    Gif,
    /// BMP.
    Bmp,
    /// WebP.
    Webp,
}

impl UploadFormat {
    /// Detect format from a MIME type.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/bmp" | "image/x-bmp" | "image/x-ms-bmp" => Some(Self::Bmp),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Detect format from a file name's extension.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    /// Canonical MIME type.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Webp => "image/webp",
        }
    }
}

impl fmt::Display for UploadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Webp => "webp",
        };
        f.write_str(name)
    }
}

/// A file offered for loading into the editor.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    /// Original file name, including extension.
    pub file_name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageUpload {
    /// Create an upload from its parts.
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Wrap a PNG snapshot so it can be sent back to the gateway.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self::new("canvas.png", UploadFormat::Png.mime(), snapshot.as_bytes())
    }

    /// Check type and size.
    ///
    /// Both the MIME type and the file extension must name an accepted format.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Validation`] for empty, oversized or non-image files.
    pub fn validate(&self) -> EditorResult<UploadFormat> {
        if self.bytes.is_empty() {
            return Err(EditorError::Validation("no file was uploaded".to_string()));
        }
        if self.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(EditorError::Validation(format!(
                "file too large (max {MAX_UPLOAD_BYTES} bytes)"
            )));
        }

        let by_mime = UploadFormat::from_mime(&self.content_type);
        let by_name = UploadFormat::from_file_name(&self.file_name);
        match (by_mime, by_name) {
            (Some(format), Some(_)) => Ok(format),
            _ => Err(EditorError::Validation(format!(
                "only jpeg, png, gif, bmp and webp images are accepted (got '{}' as {})",
                self.file_name, self.content_type
            ))),
        }
    }
}
