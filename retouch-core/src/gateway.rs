//! # Transform Gateway
//!
//! Filters, resizes, rotations, crops and saves run on an external image
//! service. The session only knows the [`TransformGateway`] capability, so an
//! HTTP client, an offline stub or a test fake can be swapped in freely.
//!
//! ```text
//! EditorSession::begin_transform ──► TransformTicket
//!                                        │
//!                       run_transform ◄──┘   (async, no session borrow)
//!                         │ upload?  submit  fetch
//!                         ▼
//! EditorSession::complete_transform(generation, outcome)
//! ```

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{EditorError, EditorResult};
use crate::history::Snapshot;
use crate::upload::ImageUpload;

/// Filters offered by the image service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Brightness multiplier (`value`, 1.0 = unchanged).
    Brightness,
    /// Linear contrast around mid-gray: `out = (in - 128) * value + 128`
    /// per channel (`value`, 1.0 = unchanged).
    Contrast,
    /// Saturation multiplier (`value`, 1.0 = unchanged).
    Saturation,
    /// Gaussian blur with sigma `value`.
    Blur,
    /// Fixed sharpen.
    Sharpen,
    /// Desaturate to gray.
    Grayscale,
    /// Warm sepia tint.
    Sepia,
    /// Invert colors.
    Negative,
}

impl FilterKind {
    /// Whether the filter needs a numeric `value`.
    #[must_use]
    pub const fn requires_value(self) -> bool {
        matches!(
            self,
            Self::Brightness | Self::Contrast | Self::Saturation | Self::Blur
        )
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Saturation => "saturation",
            Self::Blur => "blur",
            Self::Sharpen => "sharpen",
            Self::Grayscale => "grayscale",
            Self::Sepia => "sepia",
            Self::Negative => "negative",
        }
    }
}

/// Output format for `save`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    /// PNG (default).
    #[default]
    Png,
    /// JPEG.
    Jpeg,
}

impl SaveFormat {
    /// Wire name, also used as file extension.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

/// A remote image operation with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "params", rename_all = "lowercase")]
pub enum TransformOperation {
    /// Apply a filter.
    Filter {
        /// Which filter.
        kind: FilterKind,
        /// Filter strength, required for some kinds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
    },
    /// Resize to exact dimensions.
    Resize {
        /// Target width in pixels.
        width: u32,
        /// Target height in pixels.
        height: u32,
    },
    /// Rotate clockwise.
    Rotate {
        /// Angle in degrees.
        angle_degrees: i32,
    },
    /// Extract a rectangle.
    Crop {
        /// Left edge.
        x: u32,
        /// Top edge.
        y: u32,
        /// Region width.
        width: u32,
        /// Region height.
        height: u32,
    },
    /// Store the current canvas on the service.
    Save {
        /// Encoded format.
        #[serde(default)]
        format: SaveFormat,
    },
}

impl TransformOperation {
    /// Operation name used in requests and error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Filter { .. } => "filter",
            Self::Resize { .. } => "resize",
            Self::Rotate { .. } => "rotate",
            Self::Crop { .. } => "crop",
            Self::Save { .. } => "save",
        }
    }

    /// Whether the operation produces a new image state.
    #[must_use]
    pub const fn produces_image(&self) -> bool {
        !matches!(self, Self::Save { .. })
    }

    /// Check parameters against the source image dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`EditorError::Validation`] for missing or out-of-bounds params.
    pub fn validate(&self, (src_width, src_height): (u32, u32)) -> EditorResult<()> {
        match *self {
            Self::Filter { kind, value } => {
                if kind.requires_value() {
                    match value {
                        None => {
                            return Err(EditorError::Validation(format!(
                                "{} filter requires a value",
                                kind.as_str()
                            )))
                        }
                        Some(v) if !v.is_finite() || v < 0.0 => {
                            return Err(EditorError::Validation(format!(
                                "{} value must be a non-negative number",
                                kind.as_str()
                            )))
                        }
                        Some(_) => {}
                    }
                }
                Ok(())
            }
            Self::Resize { width, height } => {
                if width == 0 || height == 0 {
                    return Err(EditorError::Validation(
                        "resize requires width and height greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
            Self::Rotate { .. } | Self::Save { .. } => Ok(()),
            Self::Crop {
                x,
                y,
                width,
                height,
            } => {
                if width == 0 || height == 0 {
                    return Err(EditorError::Validation(
                        "crop requires width and height greater than zero".to_string(),
                    ));
                }
                let right = u64::from(x) + u64::from(width);
                let bottom = u64::from(y) + u64::from(height);
                if right > u64::from(src_width) || bottom > u64::from(src_height) {
                    return Err(EditorError::Validation(format!(
                        "crop region {width}x{height}+{x}+{y} exceeds image bounds {src_width}x{src_height}"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Reference to an image held by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteImageRef {
    /// Identifier used in later requests.
    pub resource_id: String,
    /// Where the image can be fetched from.
    pub location: String,
}

impl RemoteImageRef {
    /// Create a reference.
    pub fn new(resource_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            location: location.into(),
        }
    }
}

impl fmt::Display for RemoteImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.resource_id, self.location)
    }
}

/// One request to the service.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRequest {
    /// Remote resource to operate on. `None` means the current canvas has no
    /// remote copy yet and must be uploaded first.
    pub resource_id: Option<String>,
    /// What to do.
    pub operation: TransformOperation,
    /// Encoded canvas, sent as `imageData` for `save`.
    pub image_data: Option<Snapshot>,
}

/// Failures reported by or while reaching the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// No gateway is configured.
    #[error("transform gateway is offline")]
    Offline,
    /// Transport-level failure.
    #[error("transform gateway unreachable: {0}")]
    Unreachable(String),
    /// The service answered with a failure.
    #[error("{0}")]
    Rejected(String),
    /// The service answered with something unexpected.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// Remote image service capability.
#[async_trait]
pub trait TransformGateway: Send + Sync {
    /// Upload an image and return its remote reference.
    async fn upload(&self, upload: &ImageUpload) -> Result<RemoteImageRef, GatewayError>;

    /// Run one operation and return the reference of the result.
    async fn submit(&self, request: &TransformRequest) -> Result<RemoteImageRef, GatewayError>;

    /// Download the bytes behind a reference.
    async fn fetch(&self, reference: &RemoteImageRef) -> Result<Vec<u8>, GatewayError>;
}

/// Gateway used when no image service is configured. Every call fails with
/// [`GatewayError::Offline`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGateway;

#[async_trait]
impl TransformGateway for OfflineGateway {
    async fn upload(&self, _upload: &ImageUpload) -> Result<RemoteImageRef, GatewayError> {
        Err(GatewayError::Offline)
    }

    async fn submit(&self, _request: &TransformRequest) -> Result<RemoteImageRef, GatewayError> {
        Err(GatewayError::Offline)
    }

    async fn fetch(&self, _reference: &RemoteImageRef) -> Result<Vec<u8>, GatewayError> {
        Err(GatewayError::Offline)
    }
}

/// An issued transform, handed back to the session on completion.
#[derive(Debug, Clone)]
pub struct TransformTicket {
    /// Token matching the session's pending request.
    pub generation: u64,
    /// Request to send.
    pub request: TransformRequest,
    /// Canvas state the request was issued against.
    pub source: Snapshot,
}

impl TransformTicket {
    /// Whether the source must be uploaded before the operation runs.
    #[must_use]
    pub fn needs_upload(&self) -> bool {
        self.request.operation.produces_image() && self.request.resource_id.is_none()
    }
}

/// What the service returned for a ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutcome {
    /// Reference to the result (the saved file for `save`).
    pub reference: RemoteImageRef,
    /// Result image bytes; `None` for `save`.
    pub image: Option<Vec<u8>>,
    /// Remote copy of the source, when it had to be uploaded first.
    pub uploaded: Option<RemoteImageRef>,
}

/// Validate `upload` and send it to the gateway.
///
/// Returns `None` when the gateway is offline; the image can still be loaded
/// locally and is uploaded on its first transform.
///
/// # Errors
///
/// [`EditorError::Validation`] before anything is sent, or
/// [`EditorError::Gateway`] if the upload fails.
pub async fn upload_image<G: TransformGateway + ?Sized>(
    gateway: &G,
    upload: &ImageUpload,
) -> EditorResult<Option<RemoteImageRef>> {
    upload.validate()?;
    match gateway.upload(upload).await {
        Ok(reference) => Ok(Some(reference)),
        Err(GatewayError::Offline) => Ok(None),
        Err(err) => {
            tracing::warn!(file = %upload.file_name, error = %err, "Upload to gateway failed");
            Err(EditorError::gateway("upload", err.to_string()))
        }
    }
}

/// Drive a ticket through the gateway.
///
/// Uploads the source first when it has no remote copy, submits the
/// operation, then fetches the result image. No retries.
///
/// # Errors
///
/// Returns the first [`GatewayError`] encountered.
pub async fn run_transform<G: TransformGateway + ?Sized>(
    gateway: &G,
    ticket: &TransformTicket,
) -> Result<TransformOutcome, GatewayError> {
    let mut request = ticket.request.clone();
    let mut uploaded = None;

    if ticket.needs_upload() {
        let reference = gateway
            .upload(&ImageUpload::from_snapshot(&ticket.source))
            .await?;
        tracing::debug!(resource = %reference, "Uploaded canvas before transform");
        request.resource_id = Some(reference.resource_id.clone());
        uploaded = Some(reference);
    }

    let reference = gateway.submit(&request).await?;

    let image = if request.operation.produces_image() {
        Some(gateway.fetch(&reference).await?)
    } else {
        None
    };

    Ok(TransformOutcome {
        reference,
        image,
        uploaded,
    })
}
