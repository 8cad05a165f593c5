//! Configuration for batch resolution runs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for the batch orchestrator.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum number of pairs resolved at once.
    pub max_concurrent: usize,
    /// Per-pair time limit; `None` waits indefinitely.
    pub pair_timeout: Option<Duration>,
    /// Project config file handed to looper-aware pipelines via `-C`.
    pub project_config: Option<PathBuf>,
    /// Restricts the run to these pipeline keys; empty means all.
    pub pipelines: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            pair_timeout: None,
            project_config: None,
            pipelines: Vec::new(),
        }
    }
}

impl BatchConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PIFACE_MAX_CONCURRENT`: Maximum concurrent resolutions (default: 8)
    /// - `PIFACE_PAIR_TIMEOUT_SECS`: Per-pair timeout in seconds (default: none)
    /// - `PIFACE_PROJECT_CONFIG`: Project config file for `-C`
    /// - `PIFACE_PIPELINES`: Comma-separated pipeline keys to run
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PIFACE_MAX_CONCURRENT") {
            config.max_concurrent = parse_env_value(&val, "PIFACE_MAX_CONCURRENT")?;
        }

        if let Ok(val) = std::env::var("PIFACE_PAIR_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "PIFACE_PAIR_TIMEOUT_SECS")?;
            config.pair_timeout = Some(Duration::from_secs(secs));
        }

        if let Ok(val) = std::env::var("PIFACE_PROJECT_CONFIG") {
            if !val.is_empty() {
                config.project_config = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("PIFACE_PIPELINES") {
            config.pipelines = parse_list(&val);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent > Semaphore::MAX_PERMITS {
            return Err(ConfigError::ValidationFailed(format!(
                "max_concurrent must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }

        if self.pair_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ValidationFailed(
                "pair_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set max concurrent resolutions.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Builder method to set the per-pair timeout.
    pub fn with_pair_timeout(mut self, timeout: Duration) -> Self {
        self.pair_timeout = Some(timeout);
        self
    }

    /// Builder method to set the project config file.
    pub fn with_project_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_config = Some(path.into());
        self
    }

    /// Builder method to restrict the run to some pipelines.
    pub fn with_pipelines(mut self, keys: Vec<String>) -> Self {
        self.pipelines = keys;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
