//! Window content resolution
//!
//! Decides once, at startup, what the kiosk window should display: the
//! front-end dev server, a bundled splash page on disk, or the local HTTP
//! server's own root route.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

use crate::presenter::Presenter;

/// Default development server origin
pub const DEFAULT_DEV_SERVER_URL: &str = "http://localhost:3000";

/// Default splash page file name
pub const DEFAULT_SPLASH_FILE: &str = "splash.html";

/// Default fallback page file name
pub const DEFAULT_FALLBACK_FILE: &str = "index.html";

/// Content resolution settings (`[content]` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Point the window at the dev server and proxy non-API requests to it
    pub dev_mode: bool,
    /// Development server origin
    pub dev_server_url: String,
    /// Bundle directories, relative to each search root, in probe order
    pub bundle_dirs: Vec<PathBuf>,
    /// Splash page file name
    pub splash_file: String,
    /// Page used when no splash page exists
    pub fallback_file: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            dev_server_url: DEFAULT_DEV_SERVER_URL.to_string(),
            bundle_dirs: vec![
                PathBuf::from("webview/dist"),
                PathBuf::from("dist"),
                PathBuf::from("static/dist"),
            ],
            splash_file: DEFAULT_SPLASH_FILE.to_string(),
            fallback_file: DEFAULT_FALLBACK_FILE.to_string(),
        }
    }
}

/// Resolution mode, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveMode {
    /// Show the dev server at this URL
    Development { dev_server_url: String },
    /// Probe the bundle, falling back to this server root URL
    Production { server_root_url: String },
}

impl ResolveMode {
    /// Build the mode from configuration and the port the server listens on
    pub fn from_config(config: &ContentConfig, port: u16) -> Self {
        if config.dev_mode {
            Self::Development {
                dev_server_url: config.dev_server_url.clone(),
            }
        } else {
            Self::Production {
                server_root_url: server_root_url(port),
            }
        }
    }
}

/// URL of the local server's root route
pub fn server_root_url(port: u16) -> String {
    format!("http://localhost:{}/", port)
}

/// What the window ends up showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentTarget {
    /// Front-end development server
    DevServer(String),
    /// A page on the local filesystem
    LocalFile(PathBuf),
    /// The HTTP server's own root route
    ServerRoot(String),
}

impl ContentTarget {
    /// URL the window navigates to
    pub fn url(&self) -> Result<Url, ContentError> {
        match self {
            ContentTarget::DevServer(url) | ContentTarget::ServerRoot(url) => {
                Url::parse(url).map_err(|e| ContentError::InvalidUrl(format!("{url}: {e}")))
            }
            ContentTarget::LocalFile(path) => file_url(path),
        }
    }

    /// Short name of the variant, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ContentTarget::DevServer(_) => "dev-server",
            ContentTarget::LocalFile(_) => "local-file",
            ContentTarget::ServerRoot(_) => "server-root",
        }
    }
}

impl fmt::Display for ContentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentTarget::DevServer(url) | ContentTarget::ServerRoot(url) => {
                write!(f, "{} ({})", url, self.kind())
            }
            ContentTarget::LocalFile(path) => write!(f, "{} ({})", path.display(), self.kind()),
        }
    }
}

/// Content resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("not an absolute path: {0}")]
    RelativePath(PathBuf),

    #[error("invalid URL {0}")]
    InvalidUrl(String),
}

/// Build a `file://` URL for an absolute path
pub fn file_url(path: &Path) -> Result<Url, ContentError> {
    Url::from_file_path(path).map_err(|_| ContentError::RelativePath(path.to_path_buf()))
}

// ============================================================
// Candidates
// ============================================================

/// Ordered lists of paths to probe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentCandidates {
    /// Splash page locations, best first
    pub primary: Vec<PathBuf>,
    /// Fallback page locations, tried after every primary candidate
    pub fallback: Vec<PathBuf>,
}

impl ContentCandidates {
    /// Expand the configured bundle layout under each search root
    pub fn from_config(config: &ContentConfig, search_roots: &[PathBuf]) -> Self {
        let mut primary = Vec::new();
        let mut fallback = Vec::new();

        for root in search_roots {
            for bundle in &config.bundle_dirs {
                let bundle_dir = root.join(bundle);
                primary.push(bundle_dir.join(&config.splash_file));
                primary.push(bundle_dir.join("assets").join(&config.splash_file));
                fallback.push(bundle_dir.join(&config.fallback_file));
            }
        }

        Self { primary, fallback }
    }
}

/// Directories candidates are resolved against: the working directory, then
/// the directory holding the running executable
pub fn search_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    match std::env::current_dir() {
        Ok(cwd) => roots.push(cwd),
        Err(e) => warn!(error = %e, "cannot determine working directory"),
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        if !roots.contains(&exe_dir) {
            roots.push(exe_dir);
        }
    }

    roots
}

// ============================================================
// Resolution
// ============================================================

/// Existence check used while probing candidates
pub trait PathProbe {
    fn exists(&self, path: &Path) -> bool;
}

/// Probes the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Pick the window content.
///
/// In development mode no path is probed. Otherwise the first existing
/// primary candidate wins, then the first existing fallback candidate, then
/// the server root.
pub fn resolve_content_target(
    candidates: &ContentCandidates,
    mode: &ResolveMode,
    probe: &dyn PathProbe,
) -> ContentTarget {
    let server_root_url = match mode {
        ResolveMode::Development { dev_server_url } => {
            return ContentTarget::DevServer(dev_server_url.clone());
        }
        ResolveMode::Production { server_root_url } => server_root_url,
    };

    candidates
        .primary
        .iter()
        .chain(candidates.fallback.iter())
        .find(|path| probe.exists(path))
        .map(|path| ContentTarget::LocalFile(path.clone()))
        .unwrap_or_else(|| ContentTarget::ServerRoot(server_root_url.clone()))
}

/// Hand the resolved target to the presenter.
///
/// A local file the presenter refuses falls back to `server_root_url`.
pub fn present(target: &ContentTarget, presenter: &dyn Presenter, server_root_url: &str) {
    info!(content = %target, "presenting content");

    let shown = match target {
        ContentTarget::DevServer(url) | ContentTarget::ServerRoot(url) => presenter.show_url(url),
        ContentTarget::LocalFile(path) => presenter.show_local_file(path),
    };

    if let Err(e) = shown {
        warn!(error = %e, "cannot present {}, falling back to server root", target);
        if let Err(e) = presenter.show_url(server_root_url) {
            warn!(error = %e, "cannot present server root");
        }
    }
}
