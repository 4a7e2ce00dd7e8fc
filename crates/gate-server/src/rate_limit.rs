//! Per-channel request rate limiting.
//!
//! Every (channel, key slot) pair carries two counters: requests in the
//! current minute and requests in the current day. Counters are keyed by
//! calendar labels, so a label change zeroes the matching counter before it
//! is read. State lives only in this process.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use gate_core::{SharedClock, day_key, minute_key};
use gate_metrics::set_rate_limit_records;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::debug;

/// Configured ceilings for one channel. Zero disables an axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateLimits {
    pub rpm: u32,
    pub rpd: u32,
}

impl RateLimits {
    pub fn new(rpm: u32, rpd: u32) -> Self {
        Self { rpm, rpd }
    }

    /// Both axes disabled; requests are not even counted.
    #[inline]
    pub fn is_unlimited(&self) -> bool {
        self.rpm == 0 && self.rpd == 0
    }
}

/// Which counter rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateAxis {
    Minute,
    Day,
}

impl RateAxis {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "per-minute",
            Self::Day => "per-day",
        }
    }
}

impl fmt::Display for RateAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request refused by [`ChannelRateLimiter::check_and_record`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("channel {channel_id} (key {key_slot}) reached its {axis} request limit ({count}/{limit})")]
pub struct RateLimitRejection {
    pub channel_id: i64,
    pub key_slot: u32,
    pub axis: RateAxis,
    pub count: u32,
    pub limit: u32,
}

/// Point-in-time view of one (channel, key slot) pair.
///
/// `*_remaining` is `-1` when the axis is unlimited and never negative
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateSnapshot {
    pub channel_id: i64,
    pub key_slot: u32,
    pub rpm_count: u32,
    pub rpd_count: u32,
    pub rpm_limit: u32,
    pub rpd_limit: u32,
    pub rpm_remaining: i64,
    pub rpd_remaining: i64,
    pub minute_key: String,
    pub day_key: String,
}

fn remaining(limit: u32, count: u32) -> i64 {
    if limit == 0 {
        -1
    } else {
        i64::from(limit.saturating_sub(count))
    }
}

type SlotKey = (i64, u32);

#[derive(Debug, Clone)]
struct RateRecord {
    rpm_count: u32,
    rpd_count: u32,
    minute_key: String,
    day_key: String,
    limits: RateLimits,
}

impl RateRecord {
    fn new(minute: String, day: String, limits: RateLimits) -> Self {
        Self {
            rpm_count: 0,
            rpd_count: 0,
            minute_key: minute,
            day_key: day,
            limits,
        }
    }

    /// Zero any counter whose label is stale and adopt the current labels.
    fn roll(&mut self, minute: &str, day: &str) {
        if self.minute_key != minute {
            self.rpm_count = 0;
            minute.clone_into(&mut self.minute_key);
        }
        if self.day_key != day {
            self.rpd_count = 0;
            day.clone_into(&mut self.day_key);
        }
    }

    fn snapshot(&self, (channel_id, key_slot): SlotKey, limits: RateLimits) -> RateSnapshot {
        RateSnapshot {
            channel_id,
            key_slot,
            rpm_count: self.rpm_count,
            rpd_count: self.rpd_count,
            rpm_limit: limits.rpm,
            rpd_limit: limits.rpd,
            rpm_remaining: remaining(limits.rpm, self.rpm_count),
            rpd_remaining: remaining(limits.rpd, self.rpd_count),
            minute_key: self.minute_key.clone(),
            day_key: self.day_key.clone(),
        }
    }
}

/// In-memory minute/day counters per (channel, key slot).
///
/// The whole table sits behind one reader/writer lock: check-and-record and
/// resets take it exclusively, reporting takes it shared.
pub struct ChannelRateLimiter {
    records: Arc<RwLock<HashMap<SlotKey, RateRecord>>>,
    clock: SharedClock,
    shutdown: Arc<Notify>,
}

impl ChannelRateLimiter {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            clock,
            shutdown: Arc::new(Notify::new()),
        }
    }

    fn labels(&self) -> (String, String) {
        let now = self.clock.now();
        (minute_key(now), day_key(now))
    }

    /// Start the background task that drops records from previous days.
    pub fn start_cleanup_task(&self, cleanup_interval: Duration) {
        let records = self.records.clone();
        let clock = self.clock.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        debug!("channel rate limiter cleanup task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(cleanup_interval) => {
                        let today = day_key(clock.now());
                        let mut map = records.write();
                        let before = map.len();
                        map.retain(|_, record| record.day_key == today);
                        let removed = before - map.len();
                        set_rate_limit_records(map.len());
                        if removed > 0 {
                            debug!(removed, remaining = map.len(), "stale channel rate records evicted");
                        }
                    }
                }
            }
        });
    }

    /// Admit one request against `limits` and count it if admitted.
    ///
    /// The check and the increment happen under one exclusive lock. A
    /// rejection leaves both counters untouched. With both axes disabled the
    /// request is admitted without creating or touching a record.
    pub fn check_and_record(
        &self,
        channel_id: i64,
        key_slot: u32,
        limits: RateLimits,
    ) -> Result<RateSnapshot, RateLimitRejection> {
        if limits.is_unlimited() {
            return Ok(self.info(channel_id, key_slot, limits));
        }

        let (minute, day) = self.labels();
        let key = (channel_id, key_slot);
        let mut map = self.records.write();
        let record = map
            .entry(key)
            .or_insert_with(|| RateRecord::new(minute.clone(), day.clone(), limits));
        record.roll(&minute, &day);
        record.limits = limits;

        let rejected = if limits.rpm > 0 && record.rpm_count >= limits.rpm {
            Some((RateAxis::Minute, record.rpm_count, limits.rpm))
        } else if limits.rpd > 0 && record.rpd_count >= limits.rpd {
            Some((RateAxis::Day, record.rpd_count, limits.rpd))
        } else {
            None
        };
        if let Some((axis, count, limit)) = rejected {
            return Err(RateLimitRejection {
                channel_id,
                key_slot,
                axis,
                count,
                limit,
            });
        }

        record.rpm_count += 1;
        record.rpd_count += 1;
        debug!(
            channel_id,
            key_slot,
            rpm = record.rpm_count,
            rpm_limit = limits.rpm,
            rpd = record.rpd_count,
            rpd_limit = limits.rpd,
            "channel request counted"
        );
        Ok(record.snapshot(key, limits))
    }

    /// Current counters for one pair, reported against `limits`.
    ///
    /// Rollover is applied to the returned copy; stored records are not
    /// created or modified.
    pub fn info(&self, channel_id: i64, key_slot: u32, limits: RateLimits) -> RateSnapshot {
        let (minute, day) = self.labels();
        let key = (channel_id, key_slot);
        let map = self.records.read();
        let mut record = map
            .get(&key)
            .cloned()
            .unwrap_or_else(|| RateRecord::new(minute.clone(), day.clone(), limits));
        drop(map);
        record.roll(&minute, &day);
        record.snapshot(key, limits)
    }

    /// Counters for the given slots of one channel.
    pub fn channel_info(
        &self,
        channel_id: i64,
        slots: impl IntoIterator<Item = u32>,
        limits: RateLimits,
    ) -> Vec<RateSnapshot> {
        slots
            .into_iter()
            .map(|slot| self.info(channel_id, slot, limits))
            .collect()
    }

    /// Every tracked pair with the limits last used to count it, ordered by
    /// channel then slot.
    pub fn all_info(&self) -> Vec<RateSnapshot> {
        let (minute, day) = self.labels();
        let map = self.records.read();
        let mut out: Vec<RateSnapshot> = map
            .iter()
            .map(|(key, record)| {
                let mut record = record.clone();
                record.roll(&minute, &day);
                record.snapshot(*key, record.limits)
            })
            .collect();
        drop(map);
        out.sort_by_key(|s| (s.channel_id, s.key_slot));
        out
    }

    /// Forget one pair. Returns whether a record existed.
    pub fn reset(&self, channel_id: i64, key_slot: u32) -> bool {
        self.records.write().remove(&(channel_id, key_slot)).is_some()
    }

    /// Forget several slots of one channel, one lock acquisition per slot.
    pub fn reset_slots(&self, channel_id: i64, slots: impl IntoIterator<Item = u32>) -> usize {
        slots
            .into_iter()
            .filter(|slot| self.reset(channel_id, *slot))
            .count()
    }

    /// Number of tracked pairs.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Signal shutdown to cleanup task.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl fmt::Debug for ChannelRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRateLimiter")
            .field("records", &self.len())
            .finish_non_exhaustive()
    }
}

impl Drop for ChannelRateLimiter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
