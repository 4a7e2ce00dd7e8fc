//! Operator API under `/admin`.
//!
//! When `admin.token` is set every request must carry it as a bearer token.
//! Without a token the API only answers loopback peers.

mod channels;
mod status;
mod users;

use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{StatusCode, header::AUTHORIZATION};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use gate_auth::{AdminError, UserAdmin};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::error::ChannelError;
use crate::state::AppState;

/// Build the admin router.
pub(crate) fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(status::get_status))
        .route("/admin/users", get(users::list_users))
        .route("/admin/users/{id}", get(users::get_user))
        .route("/admin/users/{id}/quota", put(users::set_quota))
        .route("/admin/users/{id}/vip", put(users::set_vip))
        .route("/admin/quota/batch", post(users::batch_quota))
        .route("/admin/rate-limits", get(channels::all_rate_limits))
        .route(
            "/admin/rate-limits/batch",
            get(channels::batch_list).put(channels::batch_update),
        )
        .route(
            "/admin/channels/{id}/rate-limit",
            get(channels::channel_rate_limit),
        )
        .route(
            "/admin/channels/{id}/rate-limit/reset",
            post(channels::reset_rate_limit),
        )
        .route_layer(from_fn_with_state(state, require_admin))
}

async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match state.admin_token.as_deref() {
        Some(token) => {
            let presented = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim);
            if presented != Some(token) {
                warn!(path = %request.uri().path(), "admin request with missing or wrong token");
                return ApiError::new(StatusCode::UNAUTHORIZED, "admin token required")
                    .into_response();
            }
        }
        None => {
            let peer = request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0);
            if let Some(peer) = peer
                && !peer.ip().is_loopback()
            {
                warn!(peer = %peer, "admin request from non-loopback peer refused");
                return ApiError::new(
                    StatusCode::FORBIDDEN,
                    "admin API is only accessible from localhost unless admin.token is set",
                )
                .into_response();
            }
        }
    }
    next.run(request).await
}

/// Failure rendered as `{"success": false, "message": ...}`.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn unavailable() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "admission store is not configured",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "message": self.message })),
        )
            .into_response()
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        let status = match &err {
            AdminError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AdminError::Invalid(_) => StatusCode::BAD_REQUEST,
            AdminError::Corrupt { .. }
            | AdminError::Encode(_)
            | AdminError::Store(_)
            | AdminError::Ledger(_) => {
                error!(error = %err, "admin operation failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<ChannelError> for ApiError {
    fn from(err: ChannelError) -> Self {
        let status = match err {
            ChannelError::NotFound(_) => StatusCode::NOT_FOUND,
            ChannelError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("invalid request body: {}", rejection.body_text()))
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn ok<T: Serialize>(data: T) -> ApiResult {
    Ok(Json(json!({ "success": true, "data": data })))
}

fn ok_with_message<T: Serialize>(message: impl Into<String>, data: T) -> ApiResult {
    Ok(Json(json!({
        "success": true,
        "message": message.into(),
        "data": data,
    })))
}

fn user_admin(state: &AppState) -> Result<&UserAdmin, ApiError> {
    state
        .core
        .as_deref()
        .map(|core| &core.users)
        .ok_or_else(ApiError::unavailable)
}

fn parse_id(raw: &str, what: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid {what} id: {raw}")))
}
