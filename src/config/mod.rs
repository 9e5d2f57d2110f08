//! Configuration management for fetchpool
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. `.env` file in the working directory
//! 4. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use fetchpool::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Downloading with {} workers", config.pool.workers);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `FETCHPOOL__<section>__<key>`
//!
//! Examples:
//! - `FETCHPOOL__POOL__WORKERS=8`
//! - `FETCHPOOL__HTTP__PROXY=http://proxy:3128`
//! - `FETCHPOOL__LOGGING__VERBOSE=true`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/fetchpool.toml`.
//! This can be overridden using the `FETCHPOOL_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, HttpConfig, LoggingConfig, PoolConfig};
pub use validation::{MAX_WORKERS, MIN_WORKERS, ValidationError, validate_workers};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (worker count, timeouts, proxy)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load from `path` (or the default location) without validating, so
    /// overrides can be applied before a single [`Config::validate`]
    pub fn load_unvalidated(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => sources::load_from_sources(path)?,
            None => sources::load()?,
        };
        Ok(config)
    }

    /// Re-run validation after programmatic overrides (e.g. CLI flags)
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(self)?;
        Ok(())
    }

    /// Effective configuration rendered as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
