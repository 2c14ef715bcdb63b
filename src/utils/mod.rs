//! Configuration

pub mod config;

pub use config::{BatchConfig, ConfigError, ConfigurationManager, InputConfig, LocatorConfig, ServerConfig};
