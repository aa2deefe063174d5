//! TOML client configuration stored under the `.ddmlp` directory.
//!
//! Every section is optional; missing keys fall back to their defaults so a
//! config file only has to name what it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde::de::Error as SerdeDeError;
use thiserror::Error;
use tracing::debug;

use crate::app_dirs;
use crate::dd::{DdClient, DdError};
use crate::http_client::HttpTimeouts;
use crate::mlp::{FitOptions, PollSettings, RuntimeSettings, ServiceConfig};

/// Default filename of the client configuration.
pub const CONFIG_FILE_NAME: &str = "ddmlp.toml";

/// Margin kept between the server long-poll timeout and the socket read timeout.
const READ_TIMEOUT_MARGIN_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("No suitable config directory found")]
    NoConfigDir,
}

/// Everything the client needs to reach the server and create a service.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server: ServerSettings,
    pub http: HttpSettings,
    pub polling: PollingSettings,
    /// Pause between submitting a training job and the first status request.
    pub train_grace_ms: Option<u64>,
    pub service: ServiceConfig,
    pub fit: FitOptions,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Long-poll timeout sent with every status request.
    pub server_timeout_secs: u64,
    pub interval_ms: u64,
    /// `0` polls until the job ends.
    pub max_attempts: usize,
    pub deadline_secs: Option<u64>,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            server_timeout_secs: 2,
            interval_ms: 0,
            max_attempts: 10_000,
            deadline_secs: None,
        }
    }
}

impl ClientConfig {
    /// Clamp values that would make the client misbehave.
    pub fn normalized(mut self) -> Self {
        self.polling.server_timeout_secs = self.polling.server_timeout_secs.max(1);
        let min_read = self.polling.server_timeout_secs + READ_TIMEOUT_MARGIN_SECS;
        if self.http.read_timeout_secs < min_read {
            self.http.read_timeout_secs = min_read;
        }
        self
    }

    pub fn http_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_secs(self.http.connect_timeout_secs),
            read: Duration::from_secs(self.http.read_timeout_secs),
            write: Duration::from_secs(self.http.write_timeout_secs),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            server_timeout: Duration::from_secs(self.polling.server_timeout_secs),
            interval: Duration::from_millis(self.polling.interval_ms),
            max_attempts: match self.polling.max_attempts {
                0 => None,
                attempts => Some(attempts),
            },
            deadline: self.polling.deadline_secs.map(Duration::from_secs),
        }
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        let defaults = RuntimeSettings::default();
        RuntimeSettings {
            poll: self.poll_settings(),
            train_grace: self
                .train_grace_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.train_grace),
        }
    }

    /// HTTP client for the configured server.
    pub fn dd_client(&self) -> Result<DdClient, DdError> {
        DdClient::with_timeouts(&self.server.host, self.server.port, self.http_timeouts())
    }
}

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load the configuration from the app directory, returning defaults if missing.
pub fn load_or_default() -> Result<ClientConfig, ConfigError> {
    load_from(&config_path()?)
}

/// Load the configuration at `path`, returning defaults if it does not exist.
pub fn load_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    if !path.exists() {
        debug!("No config at {}; using defaults", path.display());
        return Ok(ClientConfig::default().normalized());
    }
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source: SerdeDeError::custom(source),
    })?;
    let config: ClientConfig = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Loaded config from {}", path.display());
    Ok(config.normalized())
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => {
            ConfigError::CreateDir { path, source }
        }
    }
}
