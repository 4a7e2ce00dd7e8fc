//! Channel rate-limit endpoints.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::{ApiError, ApiResult, ok, ok_with_message, parse_id};
use crate::channels::{Channel, SettingsPatch};
use crate::rate_limit::RateSnapshot;
use crate::state::AppState;

/// One (channel, key slot) row for dashboards.
#[derive(Debug, Serialize)]
struct RateLimitView {
    channel_id: i64,
    channel_name: String,
    key_index: u32,
    rpm_limit: u32,
    rpd_limit: u32,
    rpm_count: u32,
    rpd_count: u32,
    rpm_remaining: i64,
    rpd_remaining: i64,
    enabled: bool,
    minute_key: String,
    day_key: String,
}

impl RateLimitView {
    fn new(channel: &Channel, snapshot: RateSnapshot) -> Self {
        Self {
            channel_id: channel.id,
            channel_name: channel.name.clone(),
            key_index: snapshot.key_slot,
            rpm_limit: snapshot.rpm_limit,
            rpd_limit: snapshot.rpd_limit,
            rpm_count: snapshot.rpm_count,
            rpd_count: snapshot.rpd_count,
            rpm_remaining: snapshot.rpm_remaining,
            rpd_remaining: snapshot.rpd_remaining,
            enabled: channel.settings.rate_limit_enabled,
            minute_key: snapshot.minute_key,
            day_key: snapshot.day_key,
        }
    }
}

fn channel_views(state: &AppState, channel: &Channel) -> Vec<RateLimitView> {
    state
        .rate_limiter
        .channel_info(channel.id, channel.key_slots(), channel.settings.limits())
        .into_iter()
        .map(|snapshot| RateLimitView::new(channel, snapshot))
        .collect()
}

async fn find_channel(state: &AppState, raw_id: &str) -> Result<Channel, ApiError> {
    let id = parse_id(raw_id, "channel")?;
    state
        .channels
        .get(id)
        .await?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("channel {id} not found")))
}

pub(super) async fn all_rate_limits(State(state): State<AppState>) -> ApiResult {
    let channels = state.channels.list().await?;
    let views: Vec<RateLimitView> = channels
        .iter()
        .filter(|c| c.rate_limited())
        .flat_map(|c| channel_views(&state, c))
        .collect();
    Ok(Json(json!({
        "success": true,
        "data": views,
        "total": views.len(),
    })))
}

pub(super) async fn channel_rate_limit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult {
    let channel = find_channel(&state, &id).await?;
    ok(channel_views(&state, &channel))
}

#[derive(Debug, Default, Deserialize)]
struct ResetRequest {
    key_index: Option<i64>,
}

/// Reset one slot, or every slot when the body is empty, unreadable, or has
/// no non-negative `key_index`.
pub(super) async fn reset_rate_limit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let channel = find_channel(&state, &id).await?;
    let request: ResetRequest = serde_json::from_slice(&body).unwrap_or_default();

    match request.key_index.and_then(|i| u32::try_from(i).ok()) {
        Some(slot) => {
            state.rate_limiter.reset(channel.id, slot);
            info!(channel_id = channel.id, key_slot = slot, "channel rate counters reset");
        }
        None => {
            let cleared = state.rate_limiter.reset_slots(channel.id, channel.key_slots());
            info!(channel_id = channel.id, cleared, "channel rate counters reset for all slots");
        }
    }
    Ok(Json(json!({
        "success": true,
        "message": "rate limit counters reset",
    })))
}

#[derive(Debug, Deserialize)]
pub(super) struct BatchQuery {
    ids: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChannelSummary {
    id: i64,
    name: String,
    rate_limit_enabled: bool,
    rate_limit_rpm: u32,
    rate_limit_rpd: u32,
}

impl From<Channel> for ChannelSummary {
    fn from(channel: Channel) -> Self {
        Self {
            id: channel.id,
            name: channel.name,
            rate_limit_enabled: channel.settings.rate_limit_enabled,
            rate_limit_rpm: channel.settings.rate_limit_rpm,
            rate_limit_rpd: channel.settings.rate_limit_rpd,
        }
    }
}

fn parse_id_list(raw: &str) -> Result<Vec<i64>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_id(s, "channel"))
        .collect()
}

/// Channel settings for the batch editor; all channels unless `ids` is given.
pub(super) async fn batch_list(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
) -> ApiResult {
    let channels = match query.ids.as_deref() {
        Some(raw) => state.channels.get_many(&parse_id_list(raw)?).await?,
        None => state.channels.list().await?,
    };
    let summaries: Vec<ChannelSummary> = channels.into_iter().map(Into::into).collect();
    ok(summaries)
}

#[derive(Debug, Deserialize)]
pub(super) struct BatchUpdateRequest {
    #[serde(default)]
    ids: Vec<i64>,
    rate_limit_rpm: Option<i64>,
    rate_limit_rpd: Option<i64>,
    rate_limit_enabled: Option<bool>,
}

impl BatchUpdateRequest {
    /// Negative limits leave the field unchanged.
    fn patch(&self) -> SettingsPatch {
        let limit = |v: Option<i64>| v.and_then(|n| u32::try_from(n).ok());
        SettingsPatch {
            rate_limit_rpm: limit(self.rate_limit_rpm),
            rate_limit_rpd: limit(self.rate_limit_rpd),
            rate_limit_enabled: self.rate_limit_enabled,
        }
    }
}

pub(super) async fn batch_update(
    State(state): State<AppState>,
    body: Result<Json<BatchUpdateRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    if request.ids.is_empty() {
        return Err(ApiError::bad_request("ids must not be empty"));
    }

    let patch = request.patch();
    let mut updated = 0usize;
    for id in &request.ids {
        match state.channels.update_settings(*id, &patch).await {
            Ok(_) => updated += 1,
            Err(e) => warn!(channel_id = *id, error = %e, "channel settings not updated"),
        }
    }
    info!(updated, requested = request.ids.len(), "channel rate limits updated");
    ok_with_message(format!("updated {updated} channels"), updated)
}
