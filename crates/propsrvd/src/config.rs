//! Daemon settings.
//!
//! Settings are stored as TOML. Every field is optional; missing fields take
//! their defaults.
//!
//! ```toml
//! port = 18082
//! log_level = "info"
//! update_interval_ms = 100
//! product_name = "SimHub"
//! ```
//!
//! Precedence, lowest first: defaults, settings file, environment
//! (`PROPSRV_PORT`, `PROPSRV_LOG_LEVEL`), command line.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default TCP port of the property server.
pub const DEFAULT_PORT: u16 = 18082;

/// Default minimum interval between two processed host ticks.
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 100;

/// Default product name shown in the greeting.
pub const DEFAULT_PRODUCT_NAME: &str = "SimHub";

/// Environment variable overriding the port.
pub const ENV_PORT: &str = "PROPSRV_PORT";

/// Environment variable overriding the log level.
pub const ENV_LOG_LEVEL: &str = "PROPSRV_LOG_LEVEL";

/// Result type for settings operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Log verbosity
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every command, subscription and notification
    Debug,
    /// Connections, resolution failures and lifecycle (default)
    #[default]
    Info,
}

impl LogLevel {
    /// Convert to tracing level filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(ConfigError::invalid_value(
                "log_level",
                format!("expected 'debug' or 'info', got '{other}'"),
            )),
        }
    }
}

/// Property server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// TCP port on the loopback interface
    pub port: u16,

    /// Log verbosity
    pub log_level: LogLevel,

    /// Host ticks closer together than this are skipped
    pub update_interval_ms: u64,

    /// Product name used in the greeting line
    pub product_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            log_level: LogLevel::default(),
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            product_name: DEFAULT_PRODUCT_NAME.to_string(),
        }
    }
}

impl Settings {
    /// Default settings file location: `<config_dir>/propsrv/settings.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("propsrv").join("settings.toml"))
    }

    /// Loads settings from a TOML file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        contents.parse()
    }

    /// Writes settings as TOML, creating the parent directory if needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let io_error = |e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(io_error)
    }

    /// Applies `PROPSRV_PORT` and `PROPSRV_LOG_LEVEL` from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port.trim().parse().map_err(|_| {
                ConfigError::invalid_value("port", format!("'{port}' is not a valid port"))
            })?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level.parse()?;
        }
        Ok(())
    }

    /// Checks the settings are usable by the daemon.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ConfigError::invalid_value("port", "must not be 0"));
        }
        if self.update_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "update_interval_ms",
                "must be greater than 0",
            ));
        }
        if self.product_name.trim().is_empty() {
            return Err(ConfigError::invalid_value("product_name", "must not be empty"));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

/// Errors that can occur when loading, saving or validating settings
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write the settings file
    #[error("failed to access settings file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse settings: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to render TOML
    #[error("failed to serialize settings: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A field has an unusable value
    #[error("invalid {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

impl ConfigError {
    /// Create an InvalidValue error
    pub fn invalid_value(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}
