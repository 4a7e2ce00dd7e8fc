//! Key-value store adapter for quota-gate.
//!
//! Every component that persists state talks to a [`KvStore`]: a plain
//! `get`/`set` contract over string keys and string values. Three
//! implementations ship here:
//!
//! - [`RedisStore`]: native protocol client (`redis://` URLs)
//! - [`RestStore`]: HTTP command client for REST-fronted stores (`https://` URLs)
//! - [`MemoryStore`]: in-process map for tests and local development
//!
//! The transport is chosen once at startup by [`connect`], which returns a
//! [`StoreStatus`] describing either a ready [`StoreHandle`] or the reason the
//! store is unavailable.
//!
//! # Example
//!
//! ```
//! use gate_store::{KvStore, MemoryStore};
//!
//! # async fn example() -> Result<(), gate_store::StoreError> {
//! let store = MemoryStore::new();
//! store.set("user:42", r#"{"id":"42"}"#).await?;
//! assert!(store.get("user:42").await?.is_some());
//! assert!(store.get("user:43").await?.is_none());
//! # Ok(())
//! # }
//! ```

mod connect;
mod error;
mod kind;
mod memory;
mod native;
mod rest;
mod traits;

pub use connect::{ConnectOptions, DisabledReason, StoreHandle, StoreStatus, connect};
pub use error::StoreError;
pub use kind::StoreKind;
pub use memory::MemoryStore;
pub use native::RedisStore;
pub use rest::RestStore;
pub use traits::{KeyScan, KvStore};
