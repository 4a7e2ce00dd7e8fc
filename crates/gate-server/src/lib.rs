//! Admission server for quota-gate.
//!
//! Composes identity resolution, monthly quota and per-channel rate limits
//! into an axum middleware, and serves it as a forward-auth endpoint next to
//! the operator API.
//!
//! ```no_run
//! use gate_config::Config;
//! use gate_core::SystemClock;
//! use gate_store::{ConnectOptions, connect};
//! use gate_server::{AppState, run};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let store = connect(config.store.url.as_deref(), None, ConnectOptions::default()).await;
//! let state = AppState::new(&config, store, SystemClock::shared())?;
//! run(&config, state).await?;
//! # Ok(())
//! # }
//! ```

mod admin;
pub mod admission;
pub mod channels;
pub mod cli;
mod error;
pub mod rate_limit;
mod reject;
mod server;
mod state;

pub use admission::{
    AdmissionContext, ChannelPolicy, QuotaLimit, QuotaSnapshot, QuotaStatus, admission_middleware,
    admit,
};
pub use channels::{Channel, ChannelDirectory, ChannelSettings, MemoryChannelDirectory, SettingsPatch};
pub use cli::ServeArgs;
pub use error::{ChannelError, ServerError};
pub use rate_limit::{ChannelRateLimiter, RateAxis, RateLimitRejection, RateLimits, RateSnapshot};
pub use reject::AdmissionError;
pub use server::{ADMISSION_PATH, DEFAULT_SHUTDOWN_TIMEOUT, build_router, run, run_with_shutdown};
pub use state::{AdmissionCore, AdmissionPolicy, AppState, StatusReport};
pub use tokio_util::sync::CancellationToken;
