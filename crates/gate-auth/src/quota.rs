//! Monthly quota ledger.
//!
//! One [`QuotaRecord`] per user (legacy global scope) and one per
//! (user, channel). A record is only meaningful for the month named by its
//! `month_key`; reads from an earlier month are reported as zero usage.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use gate_core::{SharedClock, month_key};
use gate_store::{KvStore, StoreHandle};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::LedgerError;

/// Store key for a quota record. A channel id selects the channel-scoped
/// record; without one the legacy global record is addressed.
pub fn quota_key(user_id: &str, channel_id: Option<i64>) -> String {
    match channel_id {
        Some(cid) => format!("quota:{user_id}:channel:{cid}"),
        None => format!("quota:{user_id}"),
    }
}

/// Persisted consumption counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRecord {
    #[serde(default)]
    pub used_count: u64,
    #[serde(default)]
    pub month_key: String,
    /// Unix seconds of the last rollover or explicit reset.
    #[serde(default)]
    pub last_reset_at: i64,
}

impl QuotaRecord {
    /// Zero usage in the month containing `now`.
    pub fn fresh(now: OffsetDateTime) -> Self {
        Self {
            used_count: 0,
            month_key: month_key(now),
            last_reset_at: now.unix_timestamp(),
        }
    }

    /// Reset the counter if the record belongs to an earlier month.
    /// Returns `true` when a rollover happened.
    pub fn normalize(&mut self, now: OffsetDateTime) -> bool {
        let current = month_key(now);
        if self.month_key == current {
            return false;
        }
        self.used_count = 0;
        self.month_key = current;
        self.last_reset_at = now.unix_timestamp();
        true
    }

    /// Whether usage has reached `limit`.
    #[inline]
    pub fn is_exhausted(&self, limit: u64) -> bool {
        self.used_count >= limit
    }
}

/// Result of a debit. The request has been admitted either way; `persisted`
/// is `false` when the write failed and the count was lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitOutcome {
    pub record: QuotaRecord,
    pub persisted: bool,
}

/// Outcome of [`QuotaLedger::admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admit {
    /// Under the limit; the debit has been applied.
    Debited(DebitOutcome),
    /// At or over the limit; nothing was written.
    Exhausted(QuotaRecord),
}

#[derive(Debug)]
struct StripedLocks {
    stripes: Vec<Mutex<()>>,
}

impl StripedLocks {
    fn new(count: usize) -> Self {
        Self {
            stripes: (0..count.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() % self.stripes.len() as u64) as usize;
        self.stripes[idx].lock().await
    }
}

/// Quota counters backed by the key-value store.
///
/// Read-compare-debit cycles for the same key are serialized within this
/// process by a striped lock. Other processes sharing the store are not
/// coordinated with.
#[derive(Debug, Clone)]
pub struct QuotaLedger {
    store: StoreHandle,
    clock: SharedClock,
    locks: Arc<StripedLocks>,
}

impl QuotaLedger {
    pub fn new(store: StoreHandle, clock: SharedClock, lock_stripes: usize) -> Self {
        Self {
            store,
            clock,
            locks: Arc::new(StripedLocks::new(lock_stripes)),
        }
    }

    /// Current record, normalized to this month. Never persists.
    ///
    /// A missing record reads as zero usage. An unparsable record is treated
    /// the same way and logged.
    pub async fn read(
        &self,
        user_id: &str,
        channel_id: Option<i64>,
    ) -> Result<QuotaRecord, LedgerError> {
        let key = quota_key(user_id, channel_id);
        let now = self.clock.now();
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(QuotaRecord::fresh(now));
        };
        let mut record = match serde_json::from_str::<QuotaRecord>(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %key, error = %e, "quota record unreadable, treating as empty");
                return Ok(QuotaRecord::fresh(now));
            }
        };
        if record.normalize(now) {
            debug!(key = %key, month = %record.month_key, "quota month rolled over");
        }
        Ok(record)
    }

    /// Persist a record as-is.
    pub async fn write(
        &self,
        user_id: &str,
        channel_id: Option<i64>,
        record: &QuotaRecord,
    ) -> Result<(), LedgerError> {
        let raw = serde_json::to_string(record)?;
        self.store
            .set(&quota_key(user_id, channel_id), &raw)
            .await?;
        Ok(())
    }

    /// Read, add one, write. A failed write is logged and reported through
    /// [`DebitOutcome::persisted`], not as an error.
    pub async fn debit(
        &self,
        user_id: &str,
        channel_id: Option<i64>,
    ) -> Result<DebitOutcome, LedgerError> {
        let record = self.read(user_id, channel_id).await?;
        Ok(self.apply_debit(user_id, channel_id, record).await)
    }

    /// Open a serialized read-compare-debit cycle for one key.
    ///
    /// The lock is held until the returned transaction is committed or dropped.
    pub async fn begin(
        &self,
        user_id: &str,
        channel_id: Option<i64>,
    ) -> Result<QuotaTxn<'_>, LedgerError> {
        let guard = self.locks.lock(&quota_key(user_id, channel_id)).await;
        let record = self.read(user_id, channel_id).await?;
        Ok(QuotaTxn {
            ledger: self,
            _guard: guard,
            user_id: user_id.to_owned(),
            channel_id,
            record,
        })
    }

    /// Debit only if usage is below `limit`, atomically within this process.
    pub async fn admit(
        &self,
        user_id: &str,
        channel_id: Option<i64>,
        limit: u64,
    ) -> Result<Admit, LedgerError> {
        let txn = self.begin(user_id, channel_id).await?;
        if txn.is_exhausted(limit) {
            return Ok(Admit::Exhausted(txn.into_record()));
        }
        Ok(Admit::Debited(txn.commit_debit().await))
    }

    /// Overwrite usage for the current month, serialized with admissions.
    pub async fn set_usage(
        &self,
        user_id: &str,
        channel_id: Option<i64>,
        used_count: u64,
    ) -> Result<QuotaRecord, LedgerError> {
        let _guard = self.locks.lock(&quota_key(user_id, channel_id)).await;
        let now = self.clock.now();
        let record = QuotaRecord {
            used_count,
            month_key: month_key(now),
            last_reset_at: now.unix_timestamp(),
        };
        self.write(user_id, channel_id, &record).await?;
        Ok(record)
    }

    async fn apply_debit(
        &self,
        user_id: &str,
        channel_id: Option<i64>,
        mut record: QuotaRecord,
    ) -> DebitOutcome {
        record.used_count = record.used_count.saturating_add(1);
        let persisted = match self.write(user_id, channel_id, &record).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    user_id,
                    channel_id = ?channel_id,
                    used = record.used_count,
                    error = %e,
                    "quota write failed, admission not recorded"
                );
                false
            }
        };
        DebitOutcome { record, persisted }
    }
}

/// A locked read-compare-debit cycle opened by [`QuotaLedger::begin`].
#[derive(Debug)]
pub struct QuotaTxn<'a> {
    ledger: &'a QuotaLedger,
    _guard: MutexGuard<'a, ()>,
    user_id: String,
    channel_id: Option<i64>,
    record: QuotaRecord,
}

impl QuotaTxn<'_> {
    /// Record as read at the start of the cycle, already normalized.
    #[inline]
    pub fn record(&self) -> &QuotaRecord {
        &self.record
    }

    #[inline]
    pub fn is_exhausted(&self, limit: u64) -> bool {
        self.record.is_exhausted(limit)
    }

    /// Add one and persist, releasing the lock afterwards.
    pub async fn commit_debit(self) -> DebitOutcome {
        self.ledger
            .apply_debit(&self.user_id, self.channel_id, self.record)
            .await
    }

    /// Abandon the cycle without writing.
    pub fn into_record(self) -> QuotaRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use gate_core::{Clock, ManualClock};
    use gate_store::MemoryStore;
    use time::macros::datetime;

    use super::*;

    fn ledger(store: &Arc<MemoryStore>, clock: &Arc<ManualClock>) -> QuotaLedger {
        QuotaLedger::new(StoreHandle::memory(store.clone()), clock.clone(), 8)
    }

    #[test]
    fn test_keys() {
        assert_eq!(quota_key("u1", None), "quota:u1");
        assert_eq!(quota_key("u1", Some(7)), "quota:u1:channel:7");
    }

    #[tokio::test]
    async fn test_missing_record_reads_as_fresh_without_write() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-15 10:00 UTC)));
        let record = ledger(&store, &clock).read("u1", Some(3)).await.unwrap();
        assert_eq!(record.used_count, 0);
        assert_eq!(record.month_key, "2024-01");
        assert_eq!(store.set_count(), 0);
    }

    #[tokio::test]
    async fn test_rollover_resets_on_read_and_persists_on_debit() {
        let store = Arc::new(MemoryStore::with_entries([(
            "quota:u1:channel:3",
            r#"{"usedCount":29,"monthKey":"2023-12","lastResetAt":1701388800}"#,
        )]));
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 00:00:05 UTC)));
        let ledger = ledger(&store, &clock);

        let read = ledger.read("u1", Some(3)).await.unwrap();
        assert_eq!(read.used_count, 0);
        assert_eq!(read.month_key, "2024-01");
        // read does not persist the normalization
        assert!(store.value("quota:u1:channel:3").unwrap().contains("2023-12"));

        let outcome = ledger.debit("u1", Some(3)).await.unwrap();
        assert!(outcome.persisted);
        let stored: QuotaRecord =
            serde_json::from_str(&store.value("quota:u1:channel:3").unwrap()).unwrap();
        assert_eq!(stored.used_count, 1);
        assert_eq!(stored.month_key, "2024-01");
        assert_eq!(stored.last_reset_at, clock.unix());
    }

    #[tokio::test]
    async fn test_corrupt_record_reads_as_fresh() {
        let store = Arc::new(MemoryStore::with_entries([("quota:u1", "[]")]));
        let clock = Arc::new(ManualClock::new(datetime!(2024-05-05 00:00 UTC)));
        let record = ledger(&store, &clock).read("u1", None).await.unwrap();
        assert_eq!(record, QuotaRecord::fresh(clock.now()));
    }

    #[tokio::test]
    async fn test_read_failure_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        store.fail_gets(true);
        let clock = Arc::new(ManualClock::at_unix(0));
        assert!(matches!(
            ledger(&store, &clock).read("u1", None).await,
            Err(LedgerError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_write_failure_is_soft() {
        let store = Arc::new(MemoryStore::new());
        store.fail_sets(true);
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let ledger = ledger(&store, &clock);

        let first = ledger.debit("u1", None).await.unwrap();
        let second = ledger.debit("u1", None).await.unwrap();
        assert!(!first.persisted);
        // nothing stuck, so every request looks like the first
        assert_eq!(first.record.used_count, 1);
        assert_eq!(second.record.used_count, 1);
    }

    #[tokio::test]
    async fn test_admit_stops_at_limit() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(datetime!(2024-02-10 08:00 UTC)));
        let ledger = ledger(&store, &clock);

        for expected in 1..=3 {
            match ledger.admit("u1", Some(9), 3).await.unwrap() {
                Admit::Debited(out) => assert_eq!(out.record.used_count, expected),
                Admit::Exhausted(_) => panic!("admission {expected} rejected"),
            }
        }
        match ledger.admit("u1", Some(9), 3).await.unwrap() {
            Admit::Exhausted(record) => assert_eq!(record.used_count, 3),
            Admit::Debited(_) => panic!("fourth admission accepted"),
        }

        ledger.set_usage("u1", Some(9), 0).await.unwrap();
        match ledger.admit("u1", Some(9), 3).await.unwrap() {
            Admit::Debited(out) => assert_eq!(out.record.used_count, 1),
            Admit::Exhausted(_) => panic!("admission after reset rejected"),
        }

        clock.advance(Duration::from_secs(31 * 24 * 3600));
        assert_eq!(ledger.read("u1", Some(9)).await.unwrap().used_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_admissions_do_not_overshoot() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let ledger = ledger(&store, &clock);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                matches!(ledger.admit("u1", None, 5).await, Ok(Admit::Debited(_)))
            }));
        }
        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
        assert_eq!(ledger.read("u1", None).await.unwrap().used_count, 5);
    }

    #[tokio::test]
    async fn test_channel_and_global_records_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let ledger = ledger(&store, &clock);
        ledger.debit("u1", Some(1)).await.unwrap();
        assert_eq!(ledger.read("u1", None).await.unwrap().used_count, 0);
        assert_eq!(ledger.read("u1", Some(1)).await.unwrap().used_count, 1);
        assert_eq!(ledger.read("u1", Some(2)).await.unwrap().used_count, 0);
    }
}
