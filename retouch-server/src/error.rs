//! HTTP error mapping for the session API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use retouch_core::EditorError;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::metrics;

/// Errors returned by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The editing session refused the operation.
    #[error(transparent)]
    Editor(#[from] EditorError),

    /// No session with this id.
    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    /// Malformed request outside the editor's own validation.
    #[error("{0}")]
    BadRequest(String),
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Editor(err) => match err {
                EditorError::Validation(_) | EditorError::OutOfRange { .. } => {
                    StatusCode::BAD_REQUEST
                }
                EditorError::EmptyHistory
                | EditorError::NoImage
                | EditorError::TransformPending => StatusCode::CONFLICT,
                EditorError::Gateway { .. } => StatusCode::BAD_GATEWAY,
                EditorError::SessionClosed => StatusCode::NOT_FOUND,
                EditorError::Surface(_) => StatusCode::UNPROCESSABLE_ENTITY,
            },
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Editor(EditorError::Validation(_)) => {
                metrics::record_validation_failure("editor");
            }
            Self::BadRequest(_) => metrics::record_validation_failure("request"),
            _ => {}
        }
        if status.is_server_error() {
            tracing::warn!(%status, error = %self, "Request failed");
        } else {
            tracing::debug!(%status, error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
