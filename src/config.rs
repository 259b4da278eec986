//! Configuration module for jqdex.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML or YAML configuration file
//! - Environment variable overrides
//! - CLI argument overrides (applied by the `serve` command)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `JQDEX_` and use double underscores
//! to separate nested levels:
//! - `JQDEX_DATA_PATH=./data` sets `data_path`
//! - `JQDEX_SERVER__TRANSPORT=http` sets `server.transport`
//! - `JQDEX_WATCH__DEBOUNCE_MS=250` sets `watch.debounce_ms`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml, Yaml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Directory searched for in the current directory and its ancestors.
const WORKSPACE_DIR: &str = ".jqdex";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Invalid transport type '{0}'. Must be 'stdio' or 'http'")]
    InvalidTransport(String),

    #[error("The sse transport is no longer supported, use 'http' (streamable HTTP) instead")]
    SseUnsupported,

    #[error("Data path is required. Use --data-path or set data_path in config")]
    MissingDataPath,

    #[error("Data path does not exist: {}", .0.display())]
    DataPathNotFound(PathBuf),

    #[error("Data path is not a directory: {}", .0.display())]
    DataPathNotDirectory(PathBuf),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Directory holding the JSON data files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<PathBuf>,

    /// Server instructions sent to clients on initialize
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Reusable prompts exposed through MCP
    #[serde(default)]
    pub prompts: Vec<PromptConfig>,

    /// Transport settings
    #[serde(default)]
    pub server: ServerConfig,

    /// File watching settings
    #[serde(default)]
    pub watch: WatchConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// "stdio" or "http"
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Listen address for the http transport
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Bearer token required by the http transport
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Keep the file index fresh by watching the data directory
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet period before a burst of changes triggers a rescan
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for everything
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `"jqdex::watcher" = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PromptConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub arguments: Vec<PromptArgumentConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PromptArgumentConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

/// Supported MCP transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Transport::Stdio),
            "http" => Ok(Transport::Http),
            "sse" => Err(ConfigError::SseUnsupported),
            other => Err(ConfigError::InvalidTransport(other.to_string())),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => f.write_str("stdio"),
            Transport::Http => f.write_str("http"),
        }
    }
}

// Default value functions
fn default_transport() -> String {
    "stdio".to_string()
}
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_true() -> bool {
    true
}
fn default_debounce_ms() -> u64 {
    crate::registry::DEFAULT_QUIET_PERIOD.as_millis() as u64
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: None,
            instructions: None,
            prompts: Vec::new(),
            server: ServerConfig::default(),
            watch: WatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            bind: default_bind(),
            token: None,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// An explicit `config_path` must exist. Without one, `.jqdex/settings.toml`
    /// is looked up from the current directory upwards and used when found.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Some(path.to_path_buf())
            }
            None => Self::find_workspace_config(),
        };

        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
        if let Some(path) = path {
            figment = if is_yaml(&path) {
                figment.merge(Yaml::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }

        figment
            // Double underscore separates nested levels: JQDEX_SERVER__BIND
            .merge(Env::prefixed("JQDEX_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Figment(Box::new(e)))
    }

    /// Find `.jqdex/settings.toml` in the current directory or an ancestor.
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(WORKSPACE_DIR).join(SETTINGS_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Parsed transport.
    pub fn transport(&self) -> Result<Transport, ConfigError> {
        self.server.transport.parse()
    }

    /// Check that the data path is set and points at a directory.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        let path = self.data_path.clone().ok_or(ConfigError::MissingDataPath)?;
        let metadata =
            std::fs::metadata(&path).map_err(|_| ConfigError::DataPathNotFound(path.clone()))?;
        if !metadata.is_dir() {
            return Err(ConfigError::DataPathNotDirectory(path));
        }
        Ok(path)
    }

    /// Quiet period used by the registry's debouncer.
    pub fn quiet_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.watch.debounce_ms)
    }

    /// Copy of the settings safe to print (token masked).
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.server.token.is_some() {
            copy.server.token = Some("********".to_string());
        }
        copy
    }

    /// Render settings as TOML for display.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}
