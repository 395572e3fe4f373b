//! Web server implementation
//!
//! Provides the server configuration, listener binding and the accept loop.

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::timeout::{RequestBodyTimeoutLayer, ResponseBodyTimeoutLayer};
use tracing::{debug, info, warn};

use super::routes::{app_router, AppState};
use super::{
    DEFAULT_BIND, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_PORT, DEFAULT_READ_TIMEOUT_SECS,
    DEFAULT_UPLOAD_LIMIT, DEFAULT_WRITE_TIMEOUT_SECS,
};

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid listen address {0}")]
    InvalidAddress(String),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

/// Server configuration (`[server]` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Address to bind to
    pub bind: String,
    /// Maximum upload size in bytes
    pub upload_limit: usize,
    /// Seconds allowed for receiving a request body
    pub read_timeout_secs: u64,
    /// Seconds allowed for sending a response body
    pub write_timeout_secs: u64,
    /// Seconds an idle keep-alive connection may wait for its next request
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            upload_limit: DEFAULT_UPLOAD_LIMIT,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with the given port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Create a new server config with the given bind address
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Create a new server config with the given upload limit
    pub fn with_upload_limit(mut self, limit: usize) -> Self {
        self.upload_limit = limit;
        self
    }

    /// Set the read, write and idle timeouts
    pub fn with_timeouts(mut self, read: Duration, write: Duration, idle: Duration) -> Self {
        self.read_timeout_secs = read.as_secs();
        self.write_timeout_secs = write.as_secs();
        self.idle_timeout_secs = idle.as_secs();
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Time a connection may wait for a complete request head.
    ///
    /// hyper runs one timer from the moment a connection starts waiting for
    /// a request until its head is parsed, so it bounds both a slow head
    /// (read timeout) and a quiet keep-alive connection (idle timeout).
    pub fn head_timeout(&self) -> Duration {
        self.read_timeout().min(self.idle_timeout())
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.bind, self.port);
        addr.parse()
            .map_err(|_| ServerError::InvalidAddress(addr))
    }
}

/// A bound web server, ready to run
pub struct WebServer {
    config: ServerConfig,
    listener: TcpListener,
    router: Router,
}

impl WebServer {
    /// Bind the listener. Nothing is served until [`WebServer::run`].
    pub async fn bind(config: ServerConfig, state: AppState) -> Result<Self, ServerError> {
        let addr = config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let router = Self::build_router(&config, state);

        Ok(Self {
            config,
            listener,
            router,
        })
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Build the router
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let state = state.with_read_timeout(config.read_timeout());
        app_router(Arc::new(state), config.upload_limit)
            .layer(RequestBodyTimeoutLayer::new(config.read_timeout()))
            .layer(ResponseBodyTimeoutLayer::new(config.write_timeout()))
    }

    /// Serve connections until `shutdown` resolves.
    ///
    /// Each connection runs in its own task. Connections still open when the
    /// loop stops are left to finish on their own.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let addr = self
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.config.bind.clone());
        info!("Starting server on http://{}", addr);
        info!("  POST /api/upload                    - Upload a recording");
        info!("  GET  /api/videos                    - List recordings");
        info!("  GET  /api/videos/{{filename}}/stream  - Play a recording");

        let head_timeout = self.config.head_timeout();
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        continue;
                    }
                },
                _ = &mut shutdown => {
                    info!("server shutting down");
                    break;
                }
            };

            let service = TowerToHyperService::new(self.router.clone());
            tokio::spawn(async move {
                let mut builder = Builder::new(TokioExecutor::new());
                builder
                    .http1()
                    .timer(TokioTimer::new())
                    .header_read_timeout(head_timeout);

                if let Err(e) = builder
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    debug!(%peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}
