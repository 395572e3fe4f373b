//! kiosk-recorder - local media server for a video recording kiosk
//!
//! The kiosk front-end records clips in an embedded browser window and
//! uploads them to this server, which stores them in a flat directory and
//! lists them back. At startup the crate also decides what the window
//! should show: the front-end dev server, a bundled splash page, or the
//! server's own root.
//!
//! # Modules
//!
//! - [`storage`]: upload directory, staged uploads, recording listing
//! - [`web`]: HTTP routes, dev proxy, server loop
//! - [`content`]: window content resolution
//! - [`presenter`]: the interface the kiosk window implements
//! - [`config`], [`cli`]: configuration and command line
//! - [`app`]: wiring for the `run` and `serve` commands

pub mod app;
pub mod cli;
pub mod config;
pub mod content;
pub mod presenter;
pub mod storage;
pub mod web;

pub use app::{prepare_state, resolve_target, run, serve, KioskError};
pub use cli::{Cli, Commands, ServeArgs};
pub use config::{CliOverrides, ConfigError, KioskConfig, StorageConfig};
pub use content::{
    resolve_content_target, ContentCandidates, ContentConfig, ContentTarget, FsProbe, PathProbe,
    ResolveMode,
};
pub use presenter::{HeadlessPresenter, Presenter, PresenterError, WindowConfig};
pub use storage::{Recording, RecordingStore, StorageError};
pub use web::{AppState, DevProxy, ServerConfig, ShutdownCoordinator, WebServer};

/// Process exit codes
pub mod exit_codes {
    /// Clean shutdown
    pub const SUCCESS: i32 = 0;
    /// Unexpected failure
    pub const GENERAL_ERROR: i32 = 1;
    /// Configuration could not be loaded or is invalid
    pub const INVALID_CONFIG: i32 = 2;
    /// Upload directory could not be created
    pub const STORAGE_UNAVAILABLE: i32 = 3;
    /// Listen address could not be bound
    pub const BIND_FAILED: i32 = 4;
}
