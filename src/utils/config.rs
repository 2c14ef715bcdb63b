use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::algorithms::locator::TdoaLocator;

/// Complete locator configuration, one JSON document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Solver settings (arm preference, rank tolerance, refiner limits)
    pub solver: TdoaLocator,
    /// Input document handling
    pub input: InputConfig,
    /// Batch and benchmark runs
    pub batch: BatchConfig,
    /// HTTP service
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Multiplier applied to every timestamp at parse time; use
    /// `SPEED_OF_LIGHT` when timestamps are given in seconds
    pub timestamp_scale: f64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { timestamp_scale: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of consecutive rounds averaged per solve
    pub window_size: usize,
    /// Solve records on the rayon thread pool
    pub parallel: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            window_size: 1,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ip_address: String,
    pub port: u16,
    /// Route of the locate endpoint
    pub api_endpoint: String,
    /// Worker threads of the async runtime
    pub thread_num: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip_address: "0.0.0.0".to_string(),
            port: 8095,
            api_endpoint: "/locate".to_string(),
            thread_num: 8,
        }
    }
}

impl ServerConfig {
    /// `ip:port` socket address string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.ip_address, self.port)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid parameter '{parameter}' = '{value}': {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("I/O error: {message}")]
    IoError { message: String },

    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

impl ConfigError {
    fn invalid(parameter: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<String>,
}

/// Loads, validates and saves a [`LocatorConfig`]
#[derive(Debug, Default)]
pub struct ConfigurationManager {
    config: LocatorConfig,
    config_file_path: Option<String>,
    is_modified: bool,
}

impl ConfigurationManager {
    /// Manager holding the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Mutable access for command-line overrides; marks the manager modified
    pub fn config_mut(&mut self) -> &mut LocatorConfig {
        self.is_modified = true;
        &mut self.config
    }

    /// Replace the configuration after validating it
    pub fn update_config(&mut self, config: LocatorConfig) -> Result<(), ConfigError> {
        Self::first_error(Self::validate(&config))?;
        self.config = config;
        self.is_modified = true;
        Ok(())
    }

    pub fn into_config(self) -> LocatorConfig {
        self.config
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Load and validate a JSON configuration file; missing sections keep their defaults
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: LocatorConfig = serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to parse config file '{}': {}", path_str, e),
        })?;

        let validation = Self::validate(&config);
        for warning in &validation.warnings {
            info!(path = %path_str, "{}", warning);
        }
        Self::first_error(validation)?;

        debug!(path = %path_str, "configuration loaded");
        self.config = config;
        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(&self.config).map_err(|e| ConfigError::SerializationError {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })?;

        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save to the file the configuration was loaded from
    pub fn save(&mut self) -> Result<(), ConfigError> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(ConfigError::IoError {
                message: "No file path set for saving configuration".to_string(),
            }),
        }
    }

    /// Check every section and collect all problems
    pub fn validate(config: &LocatorConfig) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let scale = config.input.timestamp_scale;
        if !scale.is_finite() || scale <= 0.0 {
            errors.push(ConfigError::invalid("input.timestamp_scale", scale, "must be a positive finite number"));
        }

        if config.batch.window_size == 0 {
            errors.push(ConfigError::invalid("batch.window_size", 0, "must be at least 1"));
        }

        let server = &config.server;
        if server.ip_address.parse::<IpAddr>().is_err() {
            errors.push(ConfigError::invalid("server.ip_address", &server.ip_address, "not an IP address"));
        }
        if server.port == 0 {
            errors.push(ConfigError::invalid("server.port", 0, "must be non-zero"));
        }
        if !server.api_endpoint.starts_with('/') {
            errors.push(ConfigError::invalid("server.api_endpoint", &server.api_endpoint, "must start with '/'"));
        }
        if server.thread_num == 0 {
            errors.push(ConfigError::invalid("server.thread_num", 0, "must be at least 1"));
        }

        let rank_tolerance = config.solver.linear.rank_tolerance;
        if !(rank_tolerance > 0.0 && rank_tolerance < 1.0) {
            errors.push(ConfigError::invalid(
                "solver.linear.rank_tolerance",
                rank_tolerance,
                "must lie in (0, 1)",
            ));
        }

        let refiner = &config.solver.refiner;
        if refiner.max_iterations == 0 {
            errors.push(ConfigError::invalid("solver.refiner.max_iterations", 0, "must be at least 1"));
        } else if refiner.max_iterations > 1000 {
            warnings.push(format!(
                "solver.refiner.max_iterations = {} allows very long refinements",
                refiner.max_iterations
            ));
        }
        for (name, value) in [
            ("solver.refiner.function_tolerance", refiner.function_tolerance),
            ("solver.refiner.gradient_tolerance", refiner.gradient_tolerance),
            ("solver.refiner.parameter_tolerance", refiner.parameter_tolerance),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(ConfigError::invalid(name, value, "must be a non-negative finite number"));
            }
        }
        if !refiner.initial_damping.is_finite() || refiner.initial_damping <= 0.0 {
            errors.push(ConfigError::invalid(
                "solver.refiner.initial_damping",
                refiner.initial_damping,
                "must be a positive finite number",
            ));
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn first_error(validation: ValidationResult) -> Result<(), ConfigError> {
        match validation.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
