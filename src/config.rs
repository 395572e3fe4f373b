//! Configuration
//!
//! The effective configuration is assembled once at startup, in order:
//! built-in defaults, a TOML config file, environment overrides, then
//! command-line overrides. Nothing downstream reads the environment.
//!
//! Config file lookup (first found wins):
//! 1. `./kiosk.toml`
//! 2. `<user config dir>/kiosk-recorder/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::content::ContentConfig;
use crate::presenter::WindowConfig;
use crate::web::ServerConfig;

/// Local config file name
pub const CONFIG_FILE_NAME: &str = "kiosk.toml";

/// Directory name under the user config dir
pub const APP_DIR_NAME: &str = "kiosk-recorder";

/// Environment variable enabling dev mode
pub const DEV_ENV_VAR: &str = "DEV";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("cannot encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Storage locations (`[storage]` section)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding uploaded recordings
    pub upload_dir: PathBuf,
    /// Directory served at `/` in production
    pub static_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            static_dir: PathBuf::from("static"),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub content: ContentConfig,
    pub window: WindowConfig,
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub upload_dir: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub dev: bool,
    pub dev_server_url: Option<String>,
    pub max_upload_mb: Option<usize>,
    pub read_timeout: Option<u64>,
    pub write_timeout: Option<u64>,
    pub idle_timeout: Option<u64>,
}

impl KioskConfig {
    /// Candidate config file locations, in lookup order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(APP_DIR_NAME).join("config.toml"));
        }
        paths
    }

    /// Load the first config file found, or defaults if there is none
    pub fn load() -> Result<Self, ConfigError> {
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load a specific config file
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serialize as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply environment overrides from `vars`
    pub fn apply_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            if key.as_ref() == DEV_ENV_VAR && is_truthy(value.as_ref()) {
                self.content.dev_mode = true;
            }
        }
        self
    }

    /// Merge command-line values on top (CLI takes precedence)
    pub fn merge_with_cli(mut self, cli: &CliOverrides) -> Self {
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(bind) = &cli.bind {
            self.server.bind = bind.clone();
        }
        if let Some(mb) = cli.max_upload_mb {
            self.server.upload_limit = mb.saturating_mul(1024 * 1024);
        }
        if let Some(secs) = cli.read_timeout {
            self.server.read_timeout_secs = secs;
        }
        if let Some(secs) = cli.write_timeout {
            self.server.write_timeout_secs = secs;
        }
        if let Some(secs) = cli.idle_timeout {
            self.server.idle_timeout_secs = secs;
        }
        if let Some(dir) = &cli.upload_dir {
            self.storage.upload_dir = dir.clone();
        }
        if let Some(dir) = &cli.static_dir {
            self.storage.static_dir = dir.clone();
        }
        if cli.dev {
            self.content.dev_mode = true;
        }
        if let Some(url) = &cli.dev_server_url {
            self.content.dev_server_url = url.clone();
        }
        self
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .socket_addr()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.server.upload_limit == 0 {
            return Err(ConfigError::Invalid("upload limit must be positive".into()));
        }

        for (name, secs) in [
            ("read", self.server.read_timeout_secs),
            ("write", self.server.write_timeout_secs),
            ("idle", self.server.idle_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} timeout must be at least one second",
                    name
                )));
            }
        }

        if self.storage.upload_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("upload directory must be set".into()));
        }

        if self.content.dev_mode {
            url::Url::parse(&self.content.dev_server_url).map_err(|e| {
                ConfigError::Invalid(format!(
                    "dev server URL {}: {}",
                    self.content.dev_server_url, e
                ))
            })?;
        }

        Ok(())
    }
}

/// Interpret an environment flag value
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true"
    )
}
