//! Configuration management for fragstore
//!
//! Settings are layered from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use fragstore::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Uploading in {} fragments", config.upload.fragment_size);
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `FRAGSTORE__<section>__<key>`:
//! - `FRAGSTORE__SERVICE__ROOT_URL=https://files.example.com/v1.0`
//! - `FRAGSTORE__UPLOAD__FRAGMENT_SIZE=10MB`
//! - `FRAGSTORE__MONITOR__POLL_INTERVAL_MS=500`
//!
//! The access token is read only from `FRAGSTORE_ACCESS_TOKEN`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/fragstore.toml`.
//! This can be overridden using the `FRAGSTORE_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{Config, HttpConfig, MonitorConfig, ServiceConfig, UploadConfig};
pub use validation::ValidationError;

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
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Endpoint that accepts multipart batch requests.
    pub fn batch_url(&self) -> String {
        format!("{}/$batch", self.service.root_url.trim_end_matches('/'))
    }
}
