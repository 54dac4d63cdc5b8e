//! Configuration-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// No data directory could be resolved
    #[error("Data directory not found: {message}")]
    NotFound { message: String },

    /// The config file exists but is not valid JSON for this schema
    #[error("Failed to parse config: {message}")]
    Parse { message: String },

    /// A field holds a value outside its allowed range
    #[error("Invalid config field {field}: {message}")]
    Invalid { field: String, message: String },

    /// Reading or writing the config file failed
    #[error("Config I/O error: {message}")]
    Io { message: String },
}

impl ConfigError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid { field: field.to_string(), message: message.into() }
    }
}
