//! Configuration management for the lead outreach pipeline
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, `config/{env}`)
//! - Environment variables (`LEADFLOW__` prefix, `__` separator)
//!
//! Scoring profiles can also be loaded standalone from YAML via
//! [`ScoringConfig::load`].

pub mod outreach;
pub mod scoring;
pub mod settings;

pub use outreach::{BatchConfig, SequenceConfig, WorkerConfig};
pub use scoring::ScoringConfig;
pub use settings::{
    load_settings, load_settings_from, ObservabilityConfig, PersistenceConfig,
    RuntimeEnvironment, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
