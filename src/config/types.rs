//! Core configuration types.

use super::defaults::{
    default_inbox_capacity, default_log_filter, default_node_name, default_retry_on_abort,
};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub domains: DomainsConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Simulated processes, each with its threads and leaf contexts.
    #[serde(default, rename = "process")]
    pub processes: Vec<ProcessConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Node identity.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_node_name")]
    pub name: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_node_name(),
        }
    }
}

/// Routing behavior for commands arriving over the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Used when a wire command does not say whether it may be retried.
    #[serde(default = "default_retry_on_abort")]
    pub retry_on_abort: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            retry_on_abort: default_retry_on_abort(),
        }
    }
}

/// Execution domain tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct DomainsConfig {
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

impl Default for DomainsConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: default_inbox_capacity(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration. `RUST_LOG` takes precedence over `filter`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: LogFormat::default(),
        }
    }
}

/// A `[[process]]` block.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
    pub id: String,
    #[serde(default, rename = "thread")]
    pub threads: Vec<ThreadConfig>,
}

/// A `[[process.thread]]` block.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadConfig {
    pub id: String,
    /// Leaf context ids hosted by this thread.
    #[serde(default)]
    pub leaves: Vec<String>,
}
