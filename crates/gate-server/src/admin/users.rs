//! User quota and VIP endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use gate_auth::{BatchUsageUpdate, UsageUpdate, VipUpdate};
use serde_json::json;

use super::{ApiError, ApiResult, ok, ok_with_message, user_admin};
use crate::state::AppState;

pub(super) async fn list_users(State(state): State<AppState>) -> ApiResult {
    let users = user_admin(&state)?.list_users().await?;
    Ok(Json(json!({
        "success": true,
        "data": users,
        "total": users.len(),
    })))
}

pub(super) async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    ok(user_admin(&state)?.user_info(&id).await?)
}

pub(super) async fn set_quota(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UsageUpdate>, JsonRejection>,
) -> ApiResult {
    let Json(update) = body?;
    let record = user_admin(&state)?.set_usage(&id, &update).await?;
    ok_with_message("quota updated", record)
}

pub(super) async fn set_vip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<VipUpdate>, JsonRejection>,
) -> ApiResult {
    let Json(update) = body?;
    let doc = user_admin(&state)?.set_vip(&id, &update).await?;
    ok_with_message("vip state updated", doc)
}

pub(super) async fn batch_quota(
    State(state): State<AppState>,
    body: Result<Json<BatchUsageUpdate>, JsonRejection>,
) -> ApiResult {
    let Json(batch) = body?;
    if batch.user_ids.is_empty() {
        return Err(ApiError::bad_request("userIds must not be empty"));
    }
    let outcome = user_admin(&state)?.batch_set_usage(&batch).await;
    ok_with_message(
        format!("updated {} of {} users", outcome.success_count, batch.user_ids.len()),
        outcome,
    )
}
