//! # quota-gate
//!
//! Admission control for multi-tenant API gateways.
//!
//! Every request carrying a user credential is resolved to an identity,
//! checked against a monthly quota kept in a key-value store, and checked
//! against per-channel request rates before it is let through.
//!
//! ## Crates
//!
//! - [`gate_core`] - Defaults, header names, clock and calendar labels
//! - [`gate_store`] - Key-value store adapters (native, REST, in-memory)
//! - [`gate_auth`] - Identity resolution, quota ledger, user administration
//! - [`gate_config`] - Configuration loading and validation
//! - [`gate_metrics`] - Prometheus-compatible metrics
//! - [`gate_server`] - Admission orchestrator, rate limits and admin API

pub use gate_auth as auth;
pub use gate_config as config;
pub use gate_core as core;
pub use gate_metrics as metrics;
pub use gate_server as server;
pub use gate_store as store;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use gate_auth::{IdentityResolver, QuotaLedger, UserAdmin};
    pub use gate_config::{Config, load_config, resolve_config, validate_config};
    pub use gate_server::{AppState, CancellationToken, ServerError, build_router, run, run_with_shutdown};
    pub use gate_store::{StoreHandle, StoreStatus, connect};
}
