//! Error type constants for metrics and logging.
//!
//! These constants provide consistent error classification across all crates.

/// Store transport failure (connection refused, DNS, TLS).
pub const ERROR_STORE: &str = "store";
/// Store or upstream timeout.
pub const ERROR_TIMEOUT: &str = "timeout";
/// Credential could not be parsed or verified.
pub const ERROR_CREDENTIAL: &str = "credential";
/// Monthly quota exhausted.
pub const ERROR_QUOTA: &str = "quota";
/// Channel rate limit exceeded.
pub const ERROR_RATE_LIMIT: &str = "rate_limit";
/// Stored record could not be decoded.
pub const ERROR_CORRUPT: &str = "corrupt";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
/// Listener or socket I/O error.
pub const ERROR_IO: &str = "io";
