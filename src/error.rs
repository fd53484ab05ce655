//! Error types for the toolset service.

use thiserror::Error;

/// Main error type for toolset operations.
#[derive(Error, Debug)]
pub enum ToolsetError {
    /// Malformed rate limit string such as `"5/x"`
    #[error("Invalid rate spec {0:?}")]
    InvalidRateSpec(String),

    /// Counter or override store could not be reached
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected SEO override record
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (de)serialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<redis::RedisError> for ToolsetError {
    fn from(err: redis::RedisError) -> Self {
        ToolsetError::StoreUnavailable(err.to_string())
    }
}

/// Result type alias for toolset operations.
pub type Result<T> = std::result::Result<T, ToolsetError>;
