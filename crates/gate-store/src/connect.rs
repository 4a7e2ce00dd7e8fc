//! One-time transport selection.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gate_core::{DEFAULT_SCAN_COUNT, DEFAULT_STORE_CONNECT_TIMEOUT_SECS, DEFAULT_STORE_TIMEOUT_MS};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::kind::StoreKind;
use crate::memory::MemoryStore;
use crate::native::RedisStore;
use crate::rest::RestStore;
use crate::traits::{KeyScan, KvStore};

/// A selected store transport, shared by every component.
///
/// Cloning is cheap; all clones address the same underlying connection.
#[derive(Clone)]
pub struct StoreHandle {
    kv: Arc<dyn KvStore>,
    scan: Arc<dyn KeyScan>,
    kind: StoreKind,
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl StoreHandle {
    /// Wrap a store implementing both capabilities.
    pub fn new<S>(store: S, kind: StoreKind) -> Self
    where
        S: KvStore + KeyScan + 'static,
    {
        Self::from_arc(Arc::new(store), kind)
    }

    /// Wrap an already shared store, keeping the caller's handle usable.
    pub fn from_arc<S>(store: Arc<S>, kind: StoreKind) -> Self
    where
        S: KvStore + KeyScan + 'static,
    {
        Self {
            kv: store.clone(),
            scan: store,
            kind,
        }
    }

    /// Convenience for tests: a shared in-memory store.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self::from_arc(store, StoreKind::Memory)
    }

    #[inline]
    pub fn kind(&self) -> StoreKind {
        self.kind
    }
}

#[async_trait]
impl KvStore for StoreHandle {
    #[inline]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.kv.get(key).await
    }

    #[inline]
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.kv.set(key, value).await
    }
}

#[async_trait]
impl KeyScan for StoreHandle {
    #[inline]
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.scan.scan_prefix(prefix).await
    }
}

/// Why no store is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisabledReason {
    /// No connection URL was supplied.
    NotConfigured,
    /// A REST URL was supplied without an access token.
    MissingToken,
    /// The URL scheme is not recognised or the URL does not parse.
    InvalidUrl(String),
    /// The native store could not be reached at startup.
    ConnectFailed(String),
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => f.write_str("store url not configured"),
            Self::MissingToken => f.write_str("store url configured without access token"),
            Self::InvalidUrl(e) => write!(f, "invalid store url: {e}"),
            Self::ConnectFailed(e) => write!(f, "store connection failed: {e}"),
        }
    }
}

/// Outcome of startup transport selection.
#[derive(Debug, Clone)]
pub enum StoreStatus {
    Ready(StoreHandle),
    Disabled(DisabledReason),
}

impl StoreStatus {
    /// The handle, if the store is ready.
    pub fn handle(&self) -> Option<&StoreHandle> {
        match self {
            Self::Ready(h) => Some(h),
            Self::Disabled(_) => None,
        }
    }

    /// The reason, if the store is disabled.
    pub fn disabled_reason(&self) -> Option<&DisabledReason> {
        match self {
            Self::Ready(_) => None,
            Self::Disabled(r) => Some(r),
        }
    }
}

/// Timeouts applied by [`connect`].
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    /// Per-operation deadline.
    pub timeout: Duration,
    /// Deadline for the native connection and liveness PING.
    pub connect_timeout: Duration,
    /// SCAN page size.
    pub scan_count: u32,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            connect_timeout: Duration::from_secs(DEFAULT_STORE_CONNECT_TIMEOUT_SECS),
            scan_count: DEFAULT_SCAN_COUNT,
        }
    }
}

/// Select and initialise the store transport from connection configuration.
///
/// A `redis://` URL selects the native transport, which must answer `PING`
/// before it is accepted. An `http(s)://` URL selects the REST transport,
/// which requires a token and sends no PING. Any failure yields
/// [`StoreStatus::Disabled`]; nothing is retried.
pub async fn connect(url: Option<&str>, token: Option<&str>, opts: ConnectOptions) -> StoreStatus {
    let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        return StoreStatus::Disabled(DisabledReason::NotConfigured);
    };

    match StoreKind::from_url(url) {
        Some(StoreKind::Native) => {
            match RedisStore::connect(url, opts.connect_timeout, opts.timeout).await {
                Ok(store) => {
                    info!("native store connected");
                    StoreStatus::Ready(StoreHandle::new(
                        store.scan_count(opts.scan_count),
                        StoreKind::Native,
                    ))
                }
                Err(StoreError::InvalidUrl(e)) => {
                    warn!(error = %e, "native store url rejected");
                    StoreStatus::Disabled(DisabledReason::InvalidUrl(e))
                }
                Err(e) => {
                    warn!(error = %e, "native store ping failed, admission disabled");
                    StoreStatus::Disabled(DisabledReason::ConnectFailed(e.to_string()))
                }
            }
        }
        Some(StoreKind::Rest) => {
            let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
                warn!("rest store url set without token, admission disabled");
                return StoreStatus::Disabled(DisabledReason::MissingToken);
            };
            match RestStore::new(url, token, opts.timeout) {
                Ok(store) => {
                    info!("rest store configured");
                    StoreStatus::Ready(StoreHandle::new(
                        store.scan_count(opts.scan_count),
                        StoreKind::Rest,
                    ))
                }
                Err(e) => {
                    warn!(error = %e, "rest store could not be initialised");
                    StoreStatus::Disabled(DisabledReason::InvalidUrl(e.to_string()))
                }
            }
        }
        Some(StoreKind::Memory) | None => {
            warn!("store url has an unsupported scheme, admission disabled");
            StoreStatus::Disabled(DisabledReason::InvalidUrl(
                "expected redis://, http:// or https://".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_url_disables() {
        let status = connect(None, None, ConnectOptions::default()).await;
        assert_eq!(
            status.disabled_reason(),
            Some(&DisabledReason::NotConfigured)
        );
        let status = connect(Some("  "), Some("t"), ConnectOptions::default()).await;
        assert_eq!(
            status.disabled_reason(),
            Some(&DisabledReason::NotConfigured)
        );
    }

    #[tokio::test]
    async fn test_rest_requires_token() {
        let status = connect(Some("https://kv.example.io"), None, ConnectOptions::default()).await;
        assert_eq!(status.disabled_reason(), Some(&DisabledReason::MissingToken));
    }

    #[tokio::test]
    async fn test_rest_with_token_is_ready_without_ping() {
        let status = connect(
            Some("https://kv.example.io"),
            Some("secret"),
            ConnectOptions::default(),
        )
        .await;
        let handle = status.handle().unwrap();
        assert_eq!(handle.kind(), StoreKind::Rest);
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_invalid() {
        let status = connect(Some("memcached://x"), None, ConnectOptions::default()).await;
        assert!(matches!(
            status.disabled_reason(),
            Some(DisabledReason::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_native_store_disables() {
        let opts = ConnectOptions {
            connect_timeout: Duration::from_millis(300),
            ..ConnectOptions::default()
        };
        // Port 1 on loopback refuses connections.
        let status = connect(Some("redis://127.0.0.1:1/"), None, opts).await;
        assert!(matches!(
            status.disabled_reason(),
            Some(DisabledReason::ConnectFailed(_))
        ));
    }
}
