//! Presentation layer interface
//!
//! The kiosk window is an external collaborator. The server core only needs
//! to tell it what to display, block on its run loop, and stop it.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Condvar, Mutex};
use tracing::info;

use crate::content::{file_url, ContentError};

/// Window settings (`[window]` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Video Upload Kiosk".to_string(),
            width: 1024,
            height: 768,
        }
    }
}

/// Presenter errors
#[derive(Debug, thiserror::Error)]
pub enum PresenterError {
    #[error("cannot display local file: {0}")]
    LocalFile(#[from] ContentError),

    #[error("presenter already shut down")]
    Closed,
}

/// Something that can display a page and run a blocking UI loop.
///
/// `shutdown` may be called from any thread while `run` is blocking.
pub trait Presenter: Send + Sync {
    /// Navigate to a URL
    fn show_url(&self, url: &str) -> Result<(), PresenterError>;

    /// Display a page from the local filesystem
    fn show_local_file(&self, path: &Path) -> Result<(), PresenterError>;

    /// Block until the presenter is closed
    fn run(&self);

    /// Make `run` return
    fn shutdown(&self);
}

/// Presenter without a window.
///
/// Remembers and logs the last page it was asked to show, and blocks in
/// `run` until `shutdown` is called.
#[derive(Debug, Default)]
pub struct HeadlessPresenter {
    window: WindowConfig,
    current: Mutex<Option<String>>,
    closed: Mutex<bool>,
    closed_cv: Condvar,
}

impl HeadlessPresenter {
    /// Create a headless presenter for the given window settings
    pub fn new(window: WindowConfig) -> Self {
        Self {
            window,
            ..Default::default()
        }
    }

    /// Window settings
    pub fn window(&self) -> &WindowConfig {
        &self.window
    }

    /// Last URL shown, if any
    pub fn current(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Whether `shutdown` has been called
    pub fn is_closed(&self) -> bool {
        *self
            .closed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn navigate(&self, url: String) -> Result<(), PresenterError> {
        if self.is_closed() {
            return Err(PresenterError::Closed);
        }
        info!(title = %self.window.title, %url, "navigating");
        *self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(url);
        Ok(())
    }
}

impl Presenter for HeadlessPresenter {
    fn show_url(&self, url: &str) -> Result<(), PresenterError> {
        self.navigate(url.to_string())
    }

    fn show_local_file(&self, path: &Path) -> Result<(), PresenterError> {
        let url = file_url(path)?;
        self.navigate(url.into())
    }

    fn run(&self) {
        info!(
            title = %self.window.title,
            width = self.window.width,
            height = self.window.height,
            "presenter running headless"
        );

        let mut closed = self
            .closed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while !*closed {
            closed = self
                .closed_cv
                .wait(closed)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        info!("presenter closed");
    }

    fn shutdown(&self) {
        *self
            .closed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = true;
        self.closed_cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_window_config_default() {
        let window = WindowConfig::default();
        assert_eq!(window.title, "Video Upload Kiosk");
        assert_eq!(window.width, 1024);
        assert_eq!(window.height, 768);
    }

    #[test]
    fn test_show_url() {
        let presenter = HeadlessPresenter::default();
        assert_eq!(presenter.current(), None);

        presenter.show_url("http://localhost:3000").unwrap();
        assert_eq!(presenter.current().as_deref(), Some("http://localhost:3000"));
    }

    #[cfg(unix)]
    #[test]
    fn test_show_local_file() {
        let presenter = HeadlessPresenter::default();
        presenter
            .show_local_file(Path::new("/opt/kiosk/dist/splash.html"))
            .unwrap();
        assert_eq!(
            presenter.current().as_deref(),
            Some("file:///opt/kiosk/dist/splash.html")
        );
    }

    #[test]
    fn test_show_relative_file_fails() {
        let presenter = HeadlessPresenter::default();
        let err = presenter
            .show_local_file(Path::new("dist/splash.html"))
            .unwrap_err();
        assert!(matches!(err, PresenterError::LocalFile(_)));
        assert_eq!(presenter.current(), None);
    }

    #[test]
    fn test_run_returns_after_shutdown() {
        let presenter = Arc::new(HeadlessPresenter::new(WindowConfig::default()));
        let closer = presenter.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            closer.shutdown();
        });

        presenter.run();
        handle.join().unwrap();
        assert!(presenter.is_closed());
    }

    #[test]
    fn test_run_after_shutdown_returns_immediately() {
        let presenter = HeadlessPresenter::default();
        presenter.shutdown();
        presenter.run();
        assert!(matches!(
            presenter.show_url("http://localhost:8080/"),
            Err(PresenterError::Closed)
        ));
    }
}
