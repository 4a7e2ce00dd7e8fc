//! Operator-facing user and quota administration.

use std::time::Duration;

use gate_core::SharedClock;
use gate_store::{KeyScan, KvStore, StoreHandle};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::AdminError;
use crate::quota::{QuotaLedger, QuotaRecord, quota_key};
use crate::record::{USER_KEY_PREFIX, UserRecord, user_key};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// User summary for listings and detail views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub username: String,
    pub is_vip: bool,
    pub vip_expires_at: i64,
    /// Legacy global usage this month.
    pub quota_used: u64,
    /// `-1` while VIP is active.
    pub quota_total: i64,
    /// Month of the stored quota record, empty if none.
    pub month_key: String,
}

/// Explicit usage overwrite.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageUpdate {
    #[serde(default)]
    pub used_count: u64,
    /// Takes precedence over `used_count`.
    #[serde(default)]
    pub reset: bool,
    /// Address the channel-scoped record instead of the global one.
    #[serde(default)]
    pub channel_id: Option<i64>,
}

impl UsageUpdate {
    #[inline]
    fn target(&self) -> u64 {
        if self.reset { 0 } else { self.used_count }
    }
}

/// Batch usage overwrite.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUsageUpdate {
    pub user_ids: Vec<String>,
    #[serde(flatten)]
    pub update: UsageUpdate,
}

/// Per-user result of a batch operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub success_count: usize,
    pub failed_users: Vec<String>,
}

/// VIP change. `vip_days` wins over `vip_expires_at`; clearing the flag
/// without an explicit expiry zeroes it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VipUpdate {
    #[serde(default)]
    pub is_vip: bool,
    #[serde(default)]
    pub vip_expires_at: i64,
    #[serde(default)]
    pub vip_days: i64,
}

/// Administration over user and quota records.
#[derive(Debug, Clone)]
pub struct UserAdmin {
    store: StoreHandle,
    ledger: QuotaLedger,
    clock: SharedClock,
    monthly_quota: i64,
}

impl UserAdmin {
    pub fn new(
        store: StoreHandle,
        ledger: QuotaLedger,
        clock: SharedClock,
        monthly_quota: i64,
    ) -> Self {
        Self {
            store,
            ledger,
            clock,
            monthly_quota,
        }
    }

    /// Detail view of one user.
    pub async fn user_info(&self, user_id: &str) -> Result<UserInfo, AdminError> {
        let record = self.load_user(user_id).await?;
        Ok(self.describe(user_id, record).await)
    }

    /// Every user with a stored record, ordered by id.
    ///
    /// Unreadable records are skipped.
    pub async fn list_users(&self) -> Result<Vec<UserInfo>, AdminError> {
        let keys = self.store.scan_prefix(USER_KEY_PREFIX).await?;
        let mut users = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(user_id) = key.strip_prefix(USER_KEY_PREFIX).filter(|id| !id.is_empty())
            else {
                continue;
            };
            match self.load_user(user_id).await {
                Ok(record) => users.push(self.describe(user_id, record).await),
                Err(e) => warn!(user_id, error = %e, "skipping user in listing"),
            }
        }
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    /// Overwrite usage for the current month.
    pub async fn set_usage(
        &self,
        user_id: &str,
        update: &UsageUpdate,
    ) -> Result<QuotaRecord, AdminError> {
        if user_id.is_empty() {
            return Err(AdminError::Invalid("missing user id".into()));
        }
        let record = self
            .ledger
            .set_usage(user_id, update.channel_id, update.target())
            .await?;
        info!(
            user_id,
            channel_id = ?update.channel_id,
            used = record.used_count,
            "quota usage overwritten"
        );
        Ok(record)
    }

    /// Apply one usage overwrite to many users; failures are collected.
    pub async fn batch_set_usage(&self, batch: &BatchUsageUpdate) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for user_id in &batch.user_ids {
            match self.set_usage(user_id, &batch.update).await {
                Ok(_) => outcome.success_count += 1,
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "batch quota update failed");
                    outcome.failed_users.push(user_id.clone());
                }
            }
        }
        outcome
    }

    /// Change VIP state, rewriting the record wholesale.
    ///
    /// Fields other than `isVip`/`vipExpiresAt` are preserved verbatim.
    /// Returns the stored document.
    pub async fn set_vip(
        &self,
        user_id: &str,
        update: &VipUpdate,
    ) -> Result<Map<String, Value>, AdminError> {
        let key = user_key(user_id);
        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| AdminError::UserNotFound(user_id.to_owned()))?;
        let mut doc: Map<String, Value> =
            serde_json::from_str(&raw).map_err(|e| AdminError::Corrupt {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        doc.insert("isVip".into(), Value::Bool(update.is_vip));
        if update.vip_days > 0 {
            let days = u32::try_from(update.vip_days)
                .map_err(|_| AdminError::Invalid("vipDays out of range".into()))?;
            let expires = self.clock.now() + DAY * days;
            doc.insert("vipExpiresAt".into(), expires.unix_timestamp().into());
        } else if update.vip_expires_at > 0 {
            doc.insert("vipExpiresAt".into(), update.vip_expires_at.into());
        } else if !update.is_vip {
            doc.insert("vipExpiresAt".into(), 0.into());
        }

        self.store
            .set(&key, &serde_json::to_string(&doc)?)
            .await?;
        info!(user_id, is_vip = update.is_vip, "vip state updated");
        Ok(doc)
    }

    async fn load_user(&self, user_id: &str) -> Result<UserRecord, AdminError> {
        let key = user_key(user_id);
        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| AdminError::UserNotFound(user_id.to_owned()))?;
        serde_json::from_str(&raw).map_err(|e| AdminError::Corrupt {
            key,
            reason: e.to_string(),
        })
    }

    async fn describe(&self, user_id: &str, record: UserRecord) -> UserInfo {
        let now = self.clock.unix();
        let vip = record.vip_active(now);

        // Count is normalized to this month; month_key is reported as stored.
        let (quota_used, month_key) = match self.store.get(&quota_key(user_id, None)).await {
            Ok(Some(raw)) => match serde_json::from_str::<QuotaRecord>(&raw) {
                Ok(stored) => {
                    let mut normalized = stored.clone();
                    normalized.normalize(self.clock.now());
                    (normalized.used_count, stored.month_key)
                }
                Err(_) => (0, String::new()),
            },
            Ok(None) => (0, String::new()),
            Err(e) => {
                warn!(user_id, error = %e, "quota lookup failed while describing user");
                (0, String::new())
            }
        };

        UserInfo {
            id: user_id.to_owned(),
            email: record.email,
            username: record.username,
            is_vip: record.is_vip,
            vip_expires_at: record.vip_expires_at,
            quota_used,
            quota_total: if vip { -1 } else { self.monthly_quota },
            month_key,
        }
    }
}
