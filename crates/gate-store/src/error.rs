//! Store error types.

use std::time::Duration;

use gate_core::{ERROR_STORE, ERROR_TIMEOUT};

/// Failure talking to the key-value store.
///
/// Each transport maps its own failures into these variants so callers never
/// need to know which backend is in use.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection, DNS or I/O failure.
    #[error("store transport error: {0}")]
    Transport(String),

    /// The operation did not complete within the configured deadline.
    #[error("store request timed out after {0:?}")]
    Timeout(Duration),

    /// REST endpoint answered with a non-2xx status.
    #[error("store returned HTTP {0}")]
    Status(u16),

    /// REST endpoint answered 2xx with a body that is not a command envelope.
    #[error("malformed store response: {0}")]
    Envelope(String),

    /// The store executed the command and reported an error.
    #[error("store error: {0}")]
    Remote(String),

    /// The connection URL could not be used.
    #[error("invalid store url: {0}")]
    InvalidUrl(String),
}

impl StoreError {
    /// Create a transport error from any error type.
    #[inline]
    pub fn transport<E: std::fmt::Display>(err: E) -> Self {
        Self::Transport(err.to_string())
    }

    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => ERROR_TIMEOUT,
            _ => ERROR_STORE,
        }
    }
}
