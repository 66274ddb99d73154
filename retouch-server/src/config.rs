//! Server configuration from command-line arguments and environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use retouch_core::{SessionConfig, MAX_UPLOAD_BYTES};

/// Default port for the retouch server.
pub const DEFAULT_PORT: u16 = 9474;

/// Command-line arguments for the retouch server.
#[derive(Debug, Clone, Parser)]
#[command(name = "retouch")]
#[command(about = "Retouch image editing server")]
#[command(version)]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(long, env = "RETOUCH_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind to
    #[arg(long, env = "RETOUCH_BIND", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// Base URL of the image transform service (e.g., <http://localhost:3000>).
    /// Without it, transforms fail and uploads stay local.
    #[arg(long, env = "RETOUCH_GATEWAY_URL")]
    pub gateway_url: Option<String>,

    /// Timeout for transform service requests, in seconds
    #[arg(long, env = "RETOUCH_GATEWAY_TIMEOUT", default_value_t = 30)]
    pub gateway_timeout_secs: u64,

    /// Maximum history entries kept per session (unbounded if unset)
    #[arg(long, env = "RETOUCH_HISTORY_LIMIT")]
    pub history_limit: Option<usize>,

    /// Maximum accepted upload size in bytes; capped at the editor's 10 MB limit
    #[arg(long, env = "RETOUCH_MAX_UPLOAD_BYTES", default_value_t = MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Width of a new blank canvas
    #[arg(long, default_value_t = retouch_core::session::DEFAULT_CANVAS_WIDTH)]
    pub canvas_width: u32,

    /// Height of a new blank canvas
    #[arg(long, default_value_t = retouch_core::session::DEFAULT_CANVAS_HEIGHT)]
    pub canvas_height: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            gateway_url: None,
            gateway_timeout_secs: 30,
            history_limit: None,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            canvas_width: retouch_core::session::DEFAULT_CANVAS_WIDTH,
            canvas_height: retouch_core::session::DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl ServerConfig {
    /// Socket address to listen on.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Transform service request timeout.
    #[must_use]
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs.max(1))
    }

    /// Effective upload limit. Larger values are capped, since the editor
    /// rejects anything over [`MAX_UPLOAD_BYTES`] anyway.
    #[must_use]
    pub fn upload_limit(&self) -> usize {
        self.max_upload_bytes.min(MAX_UPLOAD_BYTES)
    }

    /// Settings for each new editing session.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
            history_limit: self.history_limit,
            ..SessionConfig::default()
        }
    }
}
