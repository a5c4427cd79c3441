//! Configuration management for the replica assistant
//!
//! Settings are layered from:
//! - YAML/TOML files under `config/`
//! - Environment variables (REPLICA_ prefix, `__` as section separator)
//!
//! Provider credentials are not part of settings; adapters read them
//! from the process environment on every availability check.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, load_settings_from, ChatConfig, ObservabilityConfig, PersistenceConfig,
    ProvidersConfig, RetrievalConfig, RouterConfig, Settings,
};

use thiserror::Error;

/// Failure to load or validate settings
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A source could not be read or deserialized
    #[error("Could not load settings: {0}")]
    Load(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}
