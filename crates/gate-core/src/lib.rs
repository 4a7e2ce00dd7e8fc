//! Core types and constants shared across quota-gate crates.
//!
//! This crate provides:
//! - Default configuration values
//! - Header names used on the admission surface
//! - Environment input names and their precedence
//! - Error type constants for metrics/logging
//! - A swappable clock and the UTC calendar labels derived from it

pub mod clock;
pub mod defaults;
pub mod env;
pub mod errors;
pub mod headers;
pub mod labels;

// Re-export commonly used items at crate root
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use defaults::*;
pub use errors::*;
pub use labels::{day_key, minute_key, month_key};

/// Project name.
pub const PROJECT_NAME: &str = "quota-gate";
/// Project version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
