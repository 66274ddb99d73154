//! HTTP client for the remote image transform service.
//!
//! Each operation is a single JSON (or multipart) POST answered with
//! `{"success": true, ...}` or `{"error": "..."}`. Result images are then
//! downloaded from the returned location. No retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use retouch_core::{
    GatewayError, ImageUpload, RemoteImageRef, TransformGateway, TransformOperation,
    TransformRequest,
};
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

/// Errors building an [`HttpTransformGateway`].
#[derive(Debug, Error)]
pub enum HttpGatewayError {
    /// The service base URL is invalid.
    #[error("invalid gateway URL: {0}")]
    InvalidUrl(String),
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// [`TransformGateway`] speaking to the image service over HTTP.
#[derive(Clone)]
pub struct HttpTransformGateway {
    inner: Arc<InnerClient>,
}

struct InnerClient {
    http: Client,
    base: Url,
}

impl std::fmt::Debug for HttpTransformGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransformGateway")
            .field("base", &self.inner.base.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpTransformGateway {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpGatewayError::InvalidUrl`] if the URL is malformed or
    /// not http(s), or [`HttpGatewayError::Http`] if the client fails to build.
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, HttpGatewayError> {
        let mut base = Url::parse(base_url.as_ref())
            .map_err(|e| HttpGatewayError::InvalidUrl(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(HttpGatewayError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                base.scheme()
            )));
        }
        // Relative endpoint joins keep any path prefix.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .user_agent(concat!("retouch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(InnerClient { http, base }),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.inner
            .base
            .join(path)
            .map_err(|e| GatewayError::InvalidResponse(format!("bad location '{path}': {e}")))
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, GatewayError> {
        let url = self.endpoint(path)?;
        tracing::debug!(%url, "Gateway request");
        let response = self
            .inner
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    fn operation_body(
        resource_id: &str,
        operation: &TransformOperation,
    ) -> Result<(&'static str, Value), GatewayError> {
        let request = match *operation {
            TransformOperation::Filter { kind, value } => (
                "api/filter",
                json!({ "filename": resource_id, "filter": kind.as_str(), "value": value }),
            ),
            TransformOperation::Resize { width, height } => (
                "api/resize",
                json!({ "filename": resource_id, "width": width, "height": height }),
            ),
            TransformOperation::Rotate { angle_degrees } => (
                "api/rotate",
                json!({ "filename": resource_id, "angle": angle_degrees }),
            ),
            TransformOperation::Crop {
                x,
                y,
                width,
                height,
            } => (
                "api/crop",
                json!({
                    "filename": resource_id,
                    "x": x,
                    "y": y,
                    "width": width,
                    "height": height
                }),
            ),
            TransformOperation::Save { .. } => {
                return Err(GatewayError::InvalidResponse(
                    "save has no resource form".to_string(),
                ))
            }
        };
        Ok(request)
    }

    async fn save(&self, request: &TransformRequest) -> Result<RemoteImageRef, GatewayError> {
        let TransformOperation::Save { format } = request.operation else {
            return Err(GatewayError::InvalidResponse(
                "not a save request".to_string(),
            ));
        };
        let snapshot = request.image_data.as_ref().ok_or_else(|| {
            GatewayError::InvalidResponse("save request without image data".to_string())
        })?;
        let (mime, encoded) = retouch_raster::image::transcode(snapshot.as_bytes(), format)
            .map_err(|e| GatewayError::Rejected(format!("could not encode canvas: {e}")))?;
        let body = json!({
            "imageData": retouch_raster::image::to_data_uri(mime, &encoded),
            "format": format.as_str(),
        });

        let value = self.post_json("api/save-canvas", body).await?;
        reference_from(&value, "savedImage")
    }
}

#[async_trait]
impl TransformGateway for HttpTransformGateway {
    async fn upload(&self, upload: &ImageUpload) -> Result<RemoteImageRef, GatewayError> {
        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(&upload.content_type)
            .map_err(|e| GatewayError::Rejected(format!("invalid content type: {e}")))?;
        let form = Form::new().part("image", part);

        let url = self.endpoint("api/upload")?;
        tracing::debug!(%url, file = %upload.file_name, "Gateway upload");
        let response = self
            .inner
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        let value = read_json(response).await?;

        let image = value
            .get("image")
            .ok_or_else(|| GatewayError::InvalidResponse("upload missing 'image'".to_string()))?;
        let filename = image.get("filename").and_then(Value::as_str);
        let location = image.get("path").and_then(Value::as_str);
        match (filename, location) {
            (Some(filename), Some(location)) => Ok(RemoteImageRef::new(filename, location)),
            _ => Err(GatewayError::InvalidResponse(
                "upload missing filename or path".to_string(),
            )),
        }
    }

    async fn submit(&self, request: &TransformRequest) -> Result<RemoteImageRef, GatewayError> {
        if let TransformOperation::Save { .. } = request.operation {
            return self.save(request).await;
        }
        let resource_id = request.resource_id.as_deref().ok_or_else(|| {
            GatewayError::InvalidResponse(format!(
                "{} request without a resource",
                request.operation.name()
            ))
        })?;
        let (path, body) = Self::operation_body(resource_id, &request.operation)?;
        let value = self.post_json(path, body).await?;
        reference_from(&value, "processedImage")
    }

    async fn fetch(&self, reference: &RemoteImageRef) -> Result<Vec<u8>, GatewayError> {
        let url = self.endpoint(&reference.location)?;
        tracing::debug!(%url, "Gateway fetch");
        let response = self.inner.http.get(url).send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Rejected(format!(
                "fetching {} failed: HTTP {status}",
                reference.location
            )));
        }
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

#[allow(clippy::needless_pass_by_value)]
fn transport_error(err: reqwest::Error) -> GatewayError {
    GatewayError::Unreachable(err.to_string())
}

/// Read a JSON body and check the service's success convention.
async fn read_json(response: reqwest::Response) -> Result<Value, GatewayError> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;
    let value: Option<Value> = serde_json::from_str(&text).ok();
    let error_message = value
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if !status.is_success() {
        return Err(GatewayError::Rejected(
            error_message.unwrap_or_else(|| format!("HTTP {status}")),
        ));
    }
    let value = value.ok_or_else(|| {
        GatewayError::InvalidResponse(format!("expected JSON, got '{}'", truncate(&text)))
    })?;
    if value.get("success").and_then(Value::as_bool) == Some(true) {
        Ok(value)
    } else {
        Err(match error_message {
            Some(message) => GatewayError::Rejected(message),
            None => GatewayError::InvalidResponse(format!("missing success flag: {value}")),
        })
    }
}

/// Build a reference from the location stored under `field`.
fn reference_from(value: &Value, field: &str) -> Result<RemoteImageRef, GatewayError> {
    let location = value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::InvalidResponse(format!("response missing '{field}'")))?;
    let resource_id = location
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .ok_or_else(|| GatewayError::InvalidResponse(format!("empty location in '{field}'")))?;
    Ok(RemoteImageRef::new(resource_id, location))
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(80) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
