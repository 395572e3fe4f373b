//! Application wiring
//!
//! Turns a [`KioskConfig`] into a running server and, for the kiosk mode, a
//! presenter showing the resolved content.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{error, info};

use crate::config::{ConfigError, KioskConfig};
use crate::content::{
    present, resolve_content_target, search_roots, server_root_url, ContentCandidates,
    ContentTarget, FsProbe, ResolveMode,
};
use crate::exit_codes;
use crate::presenter::Presenter;
use crate::storage::{RecordingStore, StorageError};
use crate::web::{
    wait_for_shutdown_signal, AppState, DevProxy, ProxyError, ServerError, ShutdownCoordinator,
    WebServer,
};

/// Fatal startup and runtime errors
#[derive(Debug, thiserror::Error)]
pub enum KioskError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("cannot start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl KioskError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            KioskError::Config(_) | KioskError::Proxy(_) => exit_codes::INVALID_CONFIG,
            KioskError::Storage(_) => exit_codes::STORAGE_UNAVAILABLE,
            KioskError::Server(ServerError::Bind { .. }) => exit_codes::BIND_FAILED,
            KioskError::Server(ServerError::InvalidAddress(_)) => exit_codes::INVALID_CONFIG,
            KioskError::Runtime(_) | KioskError::Task(_) => exit_codes::GENERAL_ERROR,
        }
    }
}

/// Ensure the upload directory exists and build the handler state
pub fn prepare_state(config: &KioskConfig) -> Result<AppState, KioskError> {
    let store = RecordingStore::open(&config.storage.upload_dir)?;
    info!(upload_dir = %store.dir().display(), "recording storage ready");

    let state = AppState::new(store, &config.storage.static_dir);
    if config.content.dev_mode {
        let proxy = DevProxy::new(&config.content.dev_server_url)?;
        info!(origin = %proxy.origin(), "dev mode: proxying non-API requests");
        Ok(state.with_dev_proxy(proxy))
    } else {
        info!(static_dir = %config.storage.static_dir.display(), "serving static files");
        Ok(state)
    }
}

/// Resolve the window content against the real filesystem
pub fn resolve_target(config: &KioskConfig, port: u16) -> ContentTarget {
    let roots: Vec<PathBuf> = search_roots();
    let candidates = ContentCandidates::from_config(&config.content, &roots);
    let mode = ResolveMode::from_config(&config.content, port);
    resolve_content_target(&candidates, &mode, &FsProbe)
}

fn build_runtime() -> Result<Runtime, KioskError> {
    Runtime::new().map_err(KioskError::Runtime)
}

/// Serve until SIGINT/SIGTERM
pub fn serve(config: &KioskConfig) -> Result<(), KioskError> {
    config.validate()?;
    let state = prepare_state(config)?;
    let runtime = build_runtime()?;

    runtime.block_on(async {
        let server = WebServer::bind(config.server.clone(), state).await?;
        server.run(wait_for_shutdown_signal()).await;
        Ok::<_, KioskError>(())
    })
}

/// Start the server, present the kiosk content and block until the
/// presenter closes.
///
/// The server is bound before anything is presented, so a bind failure
/// never shows a window.
pub fn run(config: &KioskConfig, presenter: Arc<dyn Presenter>) -> Result<(), KioskError> {
    config.validate()?;
    let state = prepare_state(config)?;
    let runtime = build_runtime()?;

    let server = runtime.block_on(WebServer::bind(config.server.clone(), state))?;
    let port = match server.local_addr() {
        Ok(addr) => addr.port(),
        Err(_) => config.server.port,
    };

    let shutdown = ShutdownCoordinator::new();
    let server_task = {
        let shutdown = shutdown.clone();
        runtime.spawn(async move { server.run(shutdown.wait_for_shutdown()).await })
    };

    {
        let presenter = presenter.clone();
        let shutdown = shutdown.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = wait_for_shutdown_signal() => presenter.shutdown(),
                _ = shutdown.wait_for_shutdown() => {}
            }
        });
    }

    let target = resolve_target(config, port);
    present(&target, presenter.as_ref(), &server_root_url(port));

    presenter.run();

    shutdown.trigger_shutdown();
    if let Err(e) = runtime.block_on(server_task) {
        error!(error = %e, "server task ended abnormally");
        return Err(e.into());
    }

    info!("kiosk stopped");
    Ok(())
}
