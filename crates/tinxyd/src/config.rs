//! Configuration file parsing and structures.
//!
//! tinxyd reads a single TOML file describing how to reach the vendor cloud
//! and which local nodes to poll directly.

use std::collections::HashMap;
use std::collections::HashSet;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

pub const DEFAULT_API_URL: &str = "https://ha-backend.tinxy.in/";

/// Top-level configuration structure
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"tinxyd::integrations" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

/// Local HTTP API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_listen() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    8565
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
        }
    }
}

/// Polling schedule
#[derive(Debug, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Full catalog resync period
    #[serde(default = "default_catalog_interval")]
    pub catalog_interval_secs: u64,

    /// Bound on each endpoint fetch; must be shorter than the poll interval
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_catalog_interval() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    4
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            catalog_interval_secs: default_catalog_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn catalog_interval(&self) -> Duration {
        Duration::from_secs(self.catalog_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    /// Vendor cloud account
    #[serde(default)]
    pub cloud: Option<CloudConfig>,

    /// Nodes polled directly on the LAN
    #[serde(default)]
    pub local: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudConfig {
    pub api_token: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

/// A node reachable on the local network
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub device_id: String,

    #[serde(default)]
    pub name: String,

    pub ip_address: String,

    #[serde(default)]
    pub mqtt_password: Option<String>,

    /// Relays in order; relay `n` is `devices[n - 1]`
    #[serde(default)]
    pub devices: Vec<NodeRelay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeRelay {
    pub name: String,

    /// `light`, `fan`, `switch`, ...
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "sync.poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.sync.catalog_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "sync.catalog_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.sync.request_timeout_secs == 0
            || self.sync.request_timeout_secs >= self.sync.poll_interval_secs
        {
            return Err(ConfigError::Validation(format!(
                "sync.request_timeout_secs ({}) must be between 1 and poll_interval_secs ({})",
                self.sync.request_timeout_secs, self.sync.poll_interval_secs
            )));
        }

        if self.integrations.cloud.is_none() && self.integrations.local.is_empty() {
            return Err(ConfigError::Validation(
                "no integrations configured: add [integrations.cloud] or [[integrations.local]]"
                    .to_string(),
            ));
        }

        if let Some(cloud) = &self.integrations.cloud {
            if cloud.api_token.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "integrations.cloud.api_token must not be empty".to_string(),
                ));
            }
            if cloud.api_url.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "integrations.cloud.api_url must not be empty".to_string(),
                ));
            }
        }

        let mut seen = HashSet::new();
        for (index, node) in self.integrations.local.iter().enumerate() {
            if node.device_id.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "integrations.local[{}].device_id must not be empty",
                    index
                )));
            }
            if node.ip_address.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "integrations.local[{}].ip_address must not be empty",
                    index
                )));
            }
            if !seen.insert(node.device_id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate local device_id {}",
                    node.device_id
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}
