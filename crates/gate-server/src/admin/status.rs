//! Status and diagnostics.

use axum::extract::State;

use super::{ApiResult, ok};
use crate::state::AppState;

pub(super) async fn get_status(State(state): State<AppState>) -> ApiResult {
    ok(state.status())
}
