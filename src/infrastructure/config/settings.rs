//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings. Every
//! section and field has a default, so an empty file is a valid config.
//!
//! # Example
//!
//! ```no_run
//! use waitnotify::infrastructure::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::dispatcher::DispatcherConfig;
use super::logging::LoggingConfig;
use super::reconciler::ReconcilerConfig;
use super::retention::RetentionConfig;
use crate::error::{ConfigError, Result};

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Record lifetimes.
    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub reconciler: ReconcilerConfig,
}

fn default_database_path() -> String {
    "waitnotify.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            logging: LoggingConfig::default(),
            retention: RetentionConfig::default(),
            dispatcher: DispatcherConfig::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

fn must_be_positive(field: &'static str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must be greater than 0".to_string(),
        }
        .into());
    }
    Ok(())
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML content is malformed or validation
    /// fails.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML content is malformed
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Initialize logging from the `[logging]` section.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    /// Check that values are present and within range.
    ///
    /// # Errors
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "database" }.into());
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "format",
                reason: format!("expected 'pretty' or 'json', got '{}'", self.logging.format),
            }
            .into());
        }

        let retention = &self.retention;
        must_be_positive("pending_wait_ttl_secs", retention.pending_wait_ttl_secs)?;
        must_be_positive("terminal_wait_ttl_secs", retention.terminal_wait_ttl_secs)?;
        must_be_positive("response_ttl_secs", retention.response_ttl_secs)?;
        must_be_positive("failure_ttl_secs", retention.failure_ttl_secs)?;
        if retention.terminal_wait_ttl_secs >= retention.pending_wait_ttl_secs {
            return Err(ConfigError::InvalidValue {
                field: "terminal_wait_ttl_secs",
                reason: "must be shorter than pending_wait_ttl_secs".to_string(),
            }
            .into());
        }

        let dispatcher = &self.dispatcher;
        if dispatcher.topics.is_empty() {
            return Err(ConfigError::MissingField { field: "topics" }.into());
        }
        if dispatcher.topics.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "topics",
                reason: "topic names must not be blank".to_string(),
            }
            .into());
        }
        must_be_positive("lease_secs", dispatcher.lease_secs)?;
        must_be_positive("poll_interval_ms", dispatcher.poll_interval_ms)?;
        must_be_positive("max_attempts", u64::from(dispatcher.max_attempts))?;
        must_be_positive("visibility_timeout_secs", dispatcher.visibility_timeout_secs)?;

        let reconciler = &self.reconciler;
        must_be_positive("interval_secs", reconciler.interval_secs)?;
        must_be_positive("batch_size", reconciler.batch_size as u64)?;
        must_be_positive("max_batches", reconciler.max_batches as u64)?;
        must_be_positive("delete_batch_size", reconciler.delete_batch_size as u64)?;
        must_be_positive("lock_lease_secs", reconciler.lock_lease_secs)?;
        if reconciler.lock_key.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "lock_key" }.into());
        }

        Ok(())
    }
}
