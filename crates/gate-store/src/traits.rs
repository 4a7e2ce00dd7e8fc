//! Store capability traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;

/// Uniform get/set over a string key-value namespace.
///
/// `Ok(None)` means the key does not exist, which is distinct from a stored
/// empty string. Implementations must be thread-safe (`Send + Sync`) as they
/// are shared across concurrent requests.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Key enumeration, used by administration listings only.
#[async_trait]
pub trait KeyScan: Send + Sync {
    /// Every key beginning with `prefix`, in no particular order.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    #[inline]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    #[inline]
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }
}

#[async_trait]
impl<S: KvStore + ?Sized> KvStore for Box<S> {
    #[inline]
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    #[inline]
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }
}

#[async_trait]
impl<S: KeyScan + ?Sized> KeyScan for Arc<S> {
    #[inline]
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).scan_prefix(prefix).await
    }
}
