//! Test server harness for integration tests.
//!
//! Spins up the real router on a random port, optionally pointed at a mock
//! transform service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use retouch_core::SessionConfig;
use retouch_server::{build_router, AppState, GatewayMode, HttpTransformGateway, SessionStore};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A test server instance with control handles.
pub struct TestServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server without a transform service.
    pub async fn start() -> Self {
        Self::with_state(AppState::offline(store())).await
    }

    /// Start a server whose gateway talks to `service_url`.
    pub async fn with_gateway(service_url: &str) -> Self {
        let gateway =
            HttpTransformGateway::new(service_url, Duration::from_secs(5)).expect("gateway");
        Self::with_state(AppState::new(store(), Arc::new(gateway), GatewayMode::Remote)).await
    }

    async fn with_state(state: AppState) -> Self {
        let port = portpicker::pick_unused_port().expect("no available port");
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let app = build_router(state);
        let listener = TcpListener::bind(addr).await.expect("failed to bind");
        let actual_addr = listener.local_addr().expect("failed to get local addr");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("server error");
        });

        // Give the server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Self {
            addr: actual_addr,
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// URL for `path` under a session.
    pub fn session_url(&self, id: &str, path: &str) -> String {
        self.url(&format!("/api/sessions/{id}{path}"))
    }

    /// Gracefully shut down the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

fn store() -> SessionStore {
    SessionStore::new(SessionConfig {
        canvas_width: 64,
        canvas_height: 48,
        ..SessionConfig::default()
    })
}
