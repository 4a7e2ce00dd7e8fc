//! In-memory store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::traits::{KeyScan, KvStore};

/// Store backed by a process-local sorted map.
///
/// Suitable for tests and single-instance development; nothing survives a
/// restart. Reads and writes can be made to fail on demand to exercise the
/// degraded paths of callers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    fail_gets: AtomicBool,
    fail_sets: AtomicBool,
    gets: AtomicU64,
    sets: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: RwLock::new(entries),
            ..Self::default()
        }
    }

    /// Insert directly, bypassing failure injection and counters.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }

    /// Read directly, bypassing failure injection and counters.
    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Number of stored keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the store holds no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Make every subsequent `get` (and scan) fail until reset.
    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::Relaxed);
    }

    /// Make every subsequent `set` fail until reset.
    pub fn fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::Relaxed);
    }

    /// Number of `get` calls observed, failed ones included.
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    /// Number of `set` calls observed, failed ones included.
    pub fn set_count(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if self.fail_gets.load(Ordering::Relaxed) {
            return Err(StoreError::transport("injected get failure"));
        }
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::Relaxed);
        if self.fail_sets.load(Ordering::Relaxed) {
            return Err(StoreError::transport("injected set failure"));
        }
        self.entries
            .write()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

#[async_trait]
impl KeyScan for MemoryStore {
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        if self.fail_gets.load(Ordering::Relaxed) {
            return Err(StoreError::transport("injected scan failure"));
        }
        let entries = self.entries.read();
        Ok(entries
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_is_distinct_from_empty() {
        let store = MemoryStore::new();
        store.set("empty", "").await.unwrap();
        assert_eq!(store.get("empty").await.unwrap(), Some(String::new()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scan_matches_prefix_only() {
        let store = MemoryStore::with_entries([
            ("quota:1", "{}"),
            ("user:1", "{}"),
            ("user:2", "{}"),
            ("users", "{}"),
        ]);
        let keys = store.scan_prefix("user:").await.unwrap();
        assert_eq!(keys, vec!["user:1".to_string(), "user:2".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        store.fail_sets(true);
        assert!(store.set("k", "v").await.is_err());
        assert!(store.is_empty());

        store.fail_sets(false);
        store.set("k", "v").await.unwrap();

        store.fail_gets(true);
        assert!(matches!(
            store.get("k").await,
            Err(StoreError::Transport(_))
        ));
        assert_eq!(store.get_count(), 1);
        assert_eq!(store.set_count(), 2);
    }
}
