//! User records and the resolved caller context.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Store key for a user record.
#[inline]
pub fn user_key(user_id: &str) -> String {
    format!("user:{user_id}")
}

/// Prefix shared by every user record key.
pub const USER_KEY_PREFIX: &str = "user:";

/// User record as persisted under `user:{id}`.
///
/// Fields this crate does not know about are kept in `extra` so a wholesale
/// rewrite never drops data written by other services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub is_vip: bool,
    /// Unix seconds; `0` when unset.
    #[serde(default)]
    pub vip_expires_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    /// VIP flag set and expiry still in the future.
    #[inline]
    pub fn vip_active(&self, now: i64) -> bool {
        self.is_vip && self.vip_expires_at > now
    }
}

/// Where a [`UserContext`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    /// The authoritative store record.
    Store,
    /// Claims only; the store lookup missed or failed.
    Claims,
}

/// Resolved caller identity handed to the admission decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub id: String,
    pub email: String,
    pub username: String,
    pub is_vip: bool,
    pub vip_expires_at: i64,
    pub source: IdentitySource,
}

impl UserContext {
    /// Context built from claims alone: never VIP, username derived from the
    /// email's local part.
    pub fn from_claims(user_id: Option<&str>, email: Option<&str>) -> Self {
        let email = email.unwrap_or_default().to_owned();
        let username = email
            .split_once('@')
            .map_or(email.as_str(), |(local, _)| local)
            .to_owned();
        Self {
            id: user_id.unwrap_or_default().to_owned(),
            email,
            username,
            is_vip: false,
            vip_expires_at: 0,
            source: IdentitySource::Claims,
        }
    }

    /// Context from a stored record; blank record fields fall back to claims.
    pub fn from_record(record: UserRecord, user_id: &str, email: Option<&str>) -> Self {
        let id = if record.id.is_empty() {
            user_id.to_owned()
        } else {
            record.id
        };
        let email = if record.email.is_empty() {
            email.unwrap_or_default().to_owned()
        } else {
            record.email
        };
        Self {
            id,
            email,
            username: record.username,
            is_vip: record.is_vip,
            vip_expires_at: record.vip_expires_at,
            source: IdentitySource::Store,
        }
    }

    /// VIP flag set and expiry still in the future.
    #[inline]
    pub fn vip_active(&self, now: i64) -> bool {
        self.is_vip && self.vip_expires_at > now
    }

    /// Subject the quota ledger counts against: the id, or the email for
    /// credentials that carry no id.
    pub fn ledger_subject(&self) -> &str {
        if self.id.is_empty() { &self.email } else { &self.id }
    }

    /// Classify the caller for quota purposes.
    pub fn classify(&self, now: i64, admin_username: &str) -> Classification {
        if self.vip_active(now) {
            Classification::Vip
        } else if !admin_username.is_empty() && self.username == admin_username {
            Classification::Admin
        } else {
            Classification::Standard
        }
    }
}

/// Quota class of a resolved caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Standard,
    Vip,
    Admin,
}

impl Classification {
    /// VIP and admin callers skip quota accounting.
    #[inline]
    pub fn bypasses_quota(self) -> bool {
        !matches!(self, Self::Standard)
    }
}
