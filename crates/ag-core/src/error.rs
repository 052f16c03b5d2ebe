//! Error types for Agogic

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum AgError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type alias
pub type AgResult<T> = Result<T, AgError>;
