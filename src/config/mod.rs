//! Configuration loading and management.
//!
//! - [`types`]: Core config struct definitions (Config, NodeConfig, RoutingConfig, ...)
//! - [`defaults`]: serde default functions
//! - [`validation`]: startup checks returning every problem found

mod defaults;
mod types;
pub mod validation;

pub use types::{
    Config, ConfigError, DomainsConfig, LogConfig, LogFormat, NodeConfig, ProcessConfig,
    RoutingConfig, ThreadConfig,
};
pub use validation::{ValidationError, validate};
