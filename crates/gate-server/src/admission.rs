//! Per-request admission decision.
//!
//! [`admit`] composes identity resolution, quota accounting and channel rate
//! limits into one accept/reject decision. [`admission_middleware`] wraps it
//! for axum: on accept the [`AdmissionContext`] is inserted into request
//! extensions and quota headers are added to the response; on reject the
//! pipeline is aborted with a structured error body.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use gate_auth::{Classification, IdentitySource, LedgerError, UserContext};
use gate_core::ERROR_CORRUPT;
use gate_core::headers::{
    CHANNEL_ID, CHANNEL_KEY_INDEX, CHANNEL_NAME, CHANNEL_QUOTA_ENABLED, CHANNEL_QUOTA_LIMIT,
    QUOTA_REMAINING, QUOTA_STATUS, QUOTA_TOTAL, QUOTA_USED,
};
use gate_metrics::{
    record_admission_accepted, record_admission_duration, record_admission_rejected,
    record_identity_fallback, record_quota_write_failure, record_rate_limit_rejected,
    record_store_error,
};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::rate_limit::RateSnapshot;
use crate::reject::AdmissionError;
use crate::state::AppState;

/// Value reported in `X-Quota-Status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaStatus {
    /// VIP or admin caller; quota skipped.
    Vip,
    /// Quota accounting switched off for the channel.
    Disabled,
    /// Channel limit is the unlimited sentinel.
    Unlimited,
    /// Counted against a finite limit.
    Active,
}

impl QuotaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vip => "vip",
            Self::Disabled => "disabled",
            Self::Unlimited => "unlimited",
            Self::Active => "active",
        }
    }
}

/// Quota state after the decision. `total`/`remaining` are `-1` when no
/// limit applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    pub status: QuotaStatus,
    pub used: u64,
    pub total: i64,
    pub remaining: i64,
}

impl QuotaSnapshot {
    fn bypass(status: QuotaStatus) -> Self {
        Self {
            status,
            used: 0,
            total: -1,
            remaining: -1,
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    fn active(used: u64, limit: u64) -> Self {
        Self {
            status: QuotaStatus::Active,
            used,
            total: limit as i64,
            remaining: limit.saturating_sub(used) as i64,
        }
    }
}

/// Monthly limit requested by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaLimit {
    Unlimited,
    Limited(u64),
}

/// Admission inputs supplied by the upstream channel selector as headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPolicy {
    /// Parsed `X-Channel-Id`; `None` addresses the global quota record.
    pub channel_id: Option<i64>,
    /// `X-Channel-Id` as received, echoed back on the response.
    pub channel_header: Option<String>,
    pub channel_name: String,
    pub quota_enabled: bool,
    pub limit: QuotaLimit,
    pub key_slot: u32,
}

impl ChannelPolicy {
    /// Read the channel headers.
    ///
    /// Quota is enabled unless `X-Channel-Quota-Enabled` is exactly `false`.
    /// A limit of `-1` means unlimited; a missing or unusable limit falls back
    /// to `default_quota`.
    #[allow(clippy::cast_sign_loss)]
    pub fn from_headers(headers: &HeaderMap, default_quota: i64) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let channel_header = text(CHANNEL_ID).map(str::to_owned);
        let channel_id = channel_header.as_deref().and_then(|v| v.parse().ok());
        let limit = match text(CHANNEL_QUOTA_LIMIT).and_then(|v| v.parse::<i64>().ok()) {
            Some(-1) => QuotaLimit::Unlimited,
            Some(n) if n >= 0 => QuotaLimit::Limited(n as u64),
            _ => QuotaLimit::Limited(default_quota.max(0) as u64),
        };

        Self {
            channel_id,
            channel_header,
            channel_name: text(CHANNEL_NAME).unwrap_or_default().to_owned(),
            quota_enabled: text(CHANNEL_QUOTA_ENABLED) != Some("false"),
            limit,
            key_slot: text(CHANNEL_KEY_INDEX)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }
}

/// What downstream handlers learn about an admitted request.
#[derive(Debug, Clone)]
pub struct AdmissionContext {
    pub user: UserContext,
    pub classification: Classification,
    pub quota: QuotaSnapshot,
    pub channel_id: Option<i64>,
    /// Channel counters after this request, when the channel is rate limited.
    pub rate: Option<RateSnapshot>,
    channel_header: Option<String>,
}

impl AdmissionContext {
    /// VIP or admin.
    #[inline]
    pub fn is_vip(&self) -> bool {
        self.classification.bypasses_quota()
    }

    /// Add the quota headers to `headers`.
    pub fn write_headers(&self, headers: &mut HeaderMap) {
        headers.insert(
            QUOTA_STATUS,
            HeaderValue::from_static(self.quota.status.as_str()),
        );
        headers.insert(QUOTA_USED, HeaderValue::from(self.quota.used));
        headers.insert(QUOTA_TOTAL, HeaderValue::from(self.quota.total));
        headers.insert(QUOTA_REMAINING, HeaderValue::from(self.quota.remaining));
        if let Some(value) = self
            .channel_header
            .as_deref()
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            headers.insert(CHANNEL_ID, value);
        }
    }
}

fn mask(credential: &str) -> &str {
    credential.get(..8).unwrap_or("")
}

/// Decide whether the request described by `headers` may proceed.
///
/// Rejections happen before any counter is touched. For a counted request
/// the quota comparison, the channel rate check and the debit run while the
/// ledger holds the per-key lock, so neither budget is consumed when the
/// other one refuses.
pub async fn admit(state: &AppState, headers: &HeaderMap) -> Result<AdmissionContext, AdmissionError> {
    let Some(core) = state.core.as_deref() else {
        return Err(AdmissionError::ServiceUnavailable(
            "admission store is not configured".into(),
        ));
    };

    let credential = headers
        .get(&state.policy.credential_header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AdmissionError::MissingCredential)?;

    let policy = ChannelPolicy::from_headers(headers, state.policy.monthly_quota);

    let user = core.resolver.resolve(credential).await.inspect_err(|e| {
        debug!(credential = %mask(credential), error = %e, "credential rejected");
    })?;
    if user.source == IdentitySource::Claims {
        record_identity_fallback();
    }
    let classification = user.classify(state.clock.unix(), &state.policy.admin_username);

    let counted = match (classification.bypasses_quota(), policy.quota_enabled, policy.limit) {
        (true, _, _) => Err(QuotaStatus::Vip),
        (false, false, _) => Err(QuotaStatus::Disabled),
        (false, true, QuotaLimit::Unlimited) => Err(QuotaStatus::Unlimited),
        (false, true, QuotaLimit::Limited(limit)) => Ok(limit),
    };

    let context = |quota, rate| AdmissionContext {
        user: user.clone(),
        classification,
        quota,
        channel_id: policy.channel_id,
        rate,
        channel_header: policy.channel_header.clone(),
    };

    let limit = match counted {
        Ok(limit) => limit,
        Err(status) => {
            let rate = check_rate(state, &policy).await?;
            debug!(user_id = %user.id, status = status.as_str(), "admitted without quota");
            return Ok(context(QuotaSnapshot::bypass(status), rate));
        }
    };

    let txn = core
        .ledger
        .begin(user.ledger_subject(), policy.channel_id)
        .await
        .map_err(|e| {
            let kind = match &e {
                LedgerError::Store(s) => s.kind(),
                LedgerError::Encode(_) => ERROR_CORRUPT,
            };
            record_store_error("quota_read", kind);
            warn!(user_id = %user.id, channel_id = ?policy.channel_id, error = %e, "quota lookup failed");
            AdmissionError::ServiceUnavailable("quota lookup failed".into())
        })?;

    if txn.is_exhausted(limit) {
        let used = txn.record().used_count;
        debug!(user_id = %user.id, channel_id = ?policy.channel_id, used, limit, "monthly quota exhausted");
        return Err(AdmissionError::QuotaExceeded {
            channel_id: policy.channel_id,
            channel_name: policy.channel_name.clone(),
            used,
            total: limit,
        });
    }

    let rate = check_rate(state, &policy).await?;

    let outcome = txn.commit_debit().await;
    if !outcome.persisted {
        record_quota_write_failure();
    }
    let used = outcome.record.used_count;
    debug!(user_id = %user.id, channel_id = ?policy.channel_id, used, limit, "quota debited");
    Ok(context(QuotaSnapshot::active(used, limit), rate))
}

/// Count the request against the channel's rate limits, if it has any.
async fn check_rate(
    state: &AppState,
    policy: &ChannelPolicy,
) -> Result<Option<RateSnapshot>, AdmissionError> {
    let Some(channel_id) = policy.channel_id else {
        return Ok(None);
    };
    let channel = match state.channels.get(channel_id).await {
        Ok(Some(channel)) if channel.rate_limited() => channel,
        Ok(_) => return Ok(None),
        Err(e) => {
            warn!(channel_id, error = %e, "channel lookup failed, rate limit not applied");
            return Ok(None);
        }
    };

    // Slots the channel does not have share slot 0's counters.
    let key_slot = if channel.key_slots().contains(&policy.key_slot) {
        policy.key_slot
    } else {
        debug!(channel_id, key_slot = policy.key_slot, "key slot out of range, counting against slot 0");
        0
    };

    match state
        .rate_limiter
        .check_and_record(channel_id, key_slot, channel.settings.limits())
    {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(rejection) => {
            record_rate_limit_rejected(rejection.axis.as_str());
            debug!(
                channel_id,
                key_slot,
                count = rejection.count,
                limit = rejection.limit,
                axis = %rejection.axis,
                "channel rate limit reached"
            );
            Err(rejection.into())
        }
    }
}

/// Axum middleware running [`admit`] in front of the wrapped routes.
pub async fn admission_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let decision = admit(&state, request.headers()).await;
    record_admission_duration(started.elapsed().as_secs_f64());

    match decision {
        Ok(context) => {
            record_admission_accepted(context.quota.status.as_str());
            let mut quota_headers = HeaderMap::new();
            context.write_headers(&mut quota_headers);
            request.extensions_mut().insert(context);

            let mut response = next.run(request).await;
            response.headers_mut().extend(quota_headers);
            response
        }
        Err(e) => {
            record_admission_rejected(e.metric_reason());
            e.into_response()
        }
    }
}
