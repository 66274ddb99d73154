//! # Retouch Server Library
//!
//! HTTP host for Retouch editing sessions. Shared by the `retouch` binary
//! and the integration tests.
//!
//! ```text
//! client ──► axum router ──► SessionStore ──► EditorSession<PixelSurface>
//!                 │                                  │
//!                 └──────── TransformGateway ◄───────┘
//!                        (HTTP service or offline)
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use retouch_core::{OfflineGateway, TransformGateway};

pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod routes;
pub mod store;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use gateway::{HttpGatewayError, HttpTransformGateway};
pub use store::{SessionStore, SharedSession};

/// Headroom on top of the file size for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Which kind of gateway the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    /// An HTTP transform service is configured.
    Remote,
    /// No service; transforms fail and uploads stay local.
    Offline,
}

impl GatewayMode {
    /// Lowercase label for health output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Offline => "offline",
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Live editing sessions.
    pub store: SessionStore,
    /// Transform service used by every session.
    pub gateway: Arc<dyn TransformGateway>,
    /// Kind of gateway, for health output.
    pub gateway_mode: GatewayMode,
    /// Largest accepted upload.
    pub max_upload_bytes: usize,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.store.len())
            .field("gateway_mode", &self.gateway_mode)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// State with an explicit gateway.
    pub fn new(
        store: SessionStore,
        gateway: Arc<dyn TransformGateway>,
        gateway_mode: GatewayMode,
    ) -> Self {
        Self {
            store,
            gateway,
            gateway_mode,
            max_upload_bytes: retouch_core::MAX_UPLOAD_BYTES,
        }
    }

    /// State without a transform service.
    #[must_use]
    pub fn offline(store: SessionStore) -> Self {
        Self::new(store, Arc::new(OfflineGateway), GatewayMode::Offline)
    }

    /// Build state from server configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HttpGatewayError`] if the gateway URL is invalid.
    pub fn from_config(config: &ServerConfig) -> Result<Self, HttpGatewayError> {
        let store = SessionStore::new(config.session_config());
        let mut state = match config.gateway_url.as_deref() {
            Some(url) => {
                let gateway = HttpTransformGateway::new(url, config.gateway_timeout())?;
                tracing::info!(base = %gateway.base_url(), "Using remote transform service");
                Self::new(store, Arc::new(gateway), GatewayMode::Remote)
            }
            None => {
                tracing::info!("No transform service configured; running offline");
                Self::offline(store)
            }
        };
        state.max_upload_bytes = config.upload_limit();
        Ok(state)
    }
}

/// Build the API and health router.
///
/// Metrics, CORS and tracing layers are added by the binary.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/health", get(health::readiness))
        .route("/api/sessions", post(routes::create_session))
        .route(
            "/api/sessions/{id}",
            get(routes::get_session).delete(routes::delete_session),
        )
        .route(
            "/api/sessions/{id}/upload",
            post(routes::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/sessions/{id}/tool", put(routes::update_tool))
        .route("/api/sessions/{id}/pointer", post(routes::pointer))
        .route("/api/sessions/{id}/undo", post(routes::undo))
        .route("/api/sessions/{id}/redo", post(routes::redo))
        .route("/api/sessions/{id}/restore/{index}", post(routes::restore))
        .route("/api/sessions/{id}/history", get(routes::history))
        .route("/api/sessions/{id}/image", get(routes::image))
        .route("/api/sessions/{id}/transform", post(routes::transform))
        .route("/api/sessions/{id}/save", post(routes::save))
        .route("/api/sessions/{id}/keys", post(routes::keys))
        .route("/api/sessions/{id}/zoom", post(routes::zoom))
        .with_state(state)
}
