//! Server error types.

use gate_config::ConfigError;
use gate_core::{ERROR_CONFIG, ERROR_IO};

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid listen address: {0}")]
    Listen(String),
    #[error("invalid header name: {0}")]
    Header(String),
}

impl ServerError {
    /// Get the error type string for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::Io(_) => ERROR_IO,
            ServerError::Config(_) | ServerError::Listen(_) | ServerError::Header(_) => {
                ERROR_CONFIG
            }
        }
    }
}

/// Channel directory failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel {0} not found")]
    NotFound(i64),
    #[error("channel directory unavailable: {0}")]
    Backend(String),
}
