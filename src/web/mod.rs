//! Local media server
//!
//! Accepts video uploads, lists and plays back stored recordings, and serves
//! the kiosk front-end (or proxies it from the dev server).
//!
//! # Endpoints
//!
//! - `POST /api/upload`: multipart upload, file part `video`
//! - `GET /api/videos`: recordings with their modification times
//! - `GET /api/videos/{filename}/stream`: recording playback
//! - everything else: static files, or the dev server in dev mode

mod proxy;
mod response;
mod routes;
mod server;
mod shutdown;

pub use proxy::{DevProxy, ProxyError};
pub use response::{json_response, ApiError};
pub use routes::{app_router, AppState, UploadResponse, VideoEntry, VIDEO_FIELD};
pub use server::{ServerConfig, ServerError, WebServer};
pub use shutdown::{wait_for_shutdown_signal, ShutdownCoordinator};

/// Default server port
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default upload limit in bytes (32 MiB)
pub const DEFAULT_UPLOAD_LIMIT: usize = 32 * 1024 * 1024;

/// Default request body read timeout in seconds
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 15;

/// Default response body write timeout in seconds
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 15;

/// Default keep-alive idle timeout in seconds
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;
