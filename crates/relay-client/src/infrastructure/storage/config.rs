//! TOML configuration for the relay client.
//!
//! Read from `--config <path>` or the platform-appropriate file:
//! - Windows:  `%APPDATA%\SlideRelay\config.toml`
//! - Linux:    `~/.config/slide-relay/config.toml`
//! - macOS:    `~/Library/Application Support/SlideRelay/config.toml`
//!
//! A missing file is not an error; every key has a default.
//!
//! ```toml
//! [server]
//! host = "192.168.0.10"
//! port = 10696
//!
//! [reconnect]
//! enabled = true
//! interval_ms = 5000
//!
//! [connection]
//! connect_timeout_ms = 10000
//! read_idle_timeout_ms = 60000
//! keepalive_interval_ms = 20000
//!
//! [detector]
//! strategy = "level"          # or "keys"
//! quiet_period_ms = 500
//! restore_level_on_stop = true
//!
//! [logging]
//! log_level = "info"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` take the value of
//! `some_fn()` when absent, and whole sections fall back to their `Default`
//! impl, so a file containing only `[server]\nhost = "..."` is complete.

use std::path::{Path, PathBuf};
use std::time::Duration;

use relay_core::{ReconnectPolicy, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::detect_direction::{DetectionStrategy, DetectorOptions};
use crate::infrastructure::network::ConnectionOptions;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is not usable.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the presentation server listens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bare IP or hostname; there is no sensible default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconnectConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_idle_timeout_ms")]
    pub read_idle_timeout_ms: u64,
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectorConfig {
    /// `"level"` or `"keys"`.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,
    #[serde(default = "default_true")]
    pub restore_level_on_stop: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_true() -> bool {
    true
}
fn default_interval_ms() -> u64 {
    5000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_read_idle_timeout_ms() -> u64 {
    60_000
}
fn default_keepalive_interval_ms() -> u64 {
    20_000
}
fn default_strategy() -> String {
    "level".to_string()
}
fn default_quiet_period_ms() -> u64 {
    500
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            read_idle_timeout_ms: default_read_idle_timeout_ms(),
            keepalive_interval_ms: default_keepalive_interval_ms(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            quiet_period_ms: default_quiet_period_ms(),
            restore_level_on_stop: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ── Validation and conversion ─────────────────────────────────────────────────

fn positive_ms(field: &'static str, ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(ms))
}

impl RelayConfig {
    /// Checks every value without building anything.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                field: "server.port",
                reason: "must be between 1 and 65535".into(),
            });
        }
        self.connection_options()?;
        self.detector_options()?;
        Ok(())
    }

    /// Timing options for the connection worker.
    pub fn connection_options(&self) -> Result<ConnectionOptions, ConfigError> {
        let interval = positive_ms("reconnect.interval_ms", self.reconnect.interval_ms)?;
        let reconnect = ReconnectPolicy::new(self.reconnect.enabled, interval).map_err(|e| {
            ConfigError::Invalid {
                field: "reconnect.interval_ms",
                reason: e.to_string(),
            }
        })?;
        Ok(ConnectionOptions {
            reconnect,
            connect_timeout: positive_ms(
                "connection.connect_timeout_ms",
                self.connection.connect_timeout_ms,
            )?,
            read_idle_timeout: positive_ms(
                "connection.read_idle_timeout_ms",
                self.connection.read_idle_timeout_ms,
            )?,
            keepalive_interval: positive_ms(
                "connection.keepalive_interval_ms",
                self.connection.keepalive_interval_ms,
            )?,
        })
    }

    /// Options for the volume detector.
    pub fn detector_options(&self) -> Result<DetectorOptions, ConfigError> {
        let strategy = self
            .detector
            .strategy
            .parse::<DetectionStrategy>()
            .map_err(|e| ConfigError::Invalid {
                field: "detector.strategy",
                reason: e.to_string(),
            })?;
        Ok(DetectorOptions {
            strategy,
            quiet_period: positive_ms("detector.quiet_period_ms", self.detector.quiet_period_ms)?,
            restore_level_on_stop: self.detector.restore_level_on_stop,
        })
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Resolves the default config file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads and validates the configuration.
///
/// Reads `path` when given, otherwise the file in the platform config
/// directory.  A file that does not exist, or a platform without a config
/// directory, yields `RelayConfig::default()`.
///
/// # Errors
///
/// [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] for malformed TOML and [`ConfigError::Invalid`] for
/// unusable values.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    match path {
        Some(p) => load_file(p.to_path_buf()),
        None => load_from_dir(platform_config_dir()),
    }
}

fn load_from_dir(dir: Option<PathBuf>) -> Result<RelayConfig, ConfigError> {
    match dir {
        Some(dir) => load_file(dir.join("config.toml")),
        None => {
            warn!("{}; using defaults", ConfigError::NoPlatformConfigDir);
            Ok(RelayConfig::default())
        }
    }
}

fn load_file(path: PathBuf) -> Result<RelayConfig, ConfigError> {
    let config = match std::fs::read_to_string(&path) {
        Ok(content) => toml::from_str::<RelayConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file; using defaults");
            RelayConfig::default()
        }
        Err(e) => return Err(ConfigError::Io { path, source: e }),
    };
    config.validate()?;
    Ok(config)
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("SlideRelay"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("slide-relay"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("SlideRelay")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
