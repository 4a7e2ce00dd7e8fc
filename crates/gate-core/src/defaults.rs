//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Server Defaults
// ============================================================================

/// Default listen address for the admission and admin HTTP surface.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Store Defaults
// ============================================================================

/// Per-operation timeout for store requests, in milliseconds.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5000;
/// Timeout for the initial native store connection and PING, in seconds.
pub const DEFAULT_STORE_CONNECT_TIMEOUT_SECS: u64 = 5;
/// Page size requested per SCAN round trip.
pub const DEFAULT_SCAN_COUNT: u32 = 100;

// ============================================================================
// Identity Defaults
// ============================================================================

/// Header carrying the external user credential.
pub const DEFAULT_CREDENTIAL_HEADER: &str = "X-External-User-Token";
/// Username that is treated as an administrator.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

// ============================================================================
// Quota Defaults
// ============================================================================

/// Monthly admission quota for standard users.
pub const DEFAULT_MONTHLY_QUOTA: i64 = 30;
/// Number of lock stripes guarding quota read-modify-write cycles.
pub const DEFAULT_LOCK_STRIPES: usize = 64;

// ============================================================================
// Rate Limit Defaults
// ============================================================================

/// Default rate limit cleanup interval in seconds.
pub const DEFAULT_RATE_LIMIT_CLEANUP_SECS: u64 = 300;

// ============================================================================
// Metrics / Logging Defaults
// ============================================================================

/// Default log level when neither config nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";
