// handlers/me.rs - GET /api/me and POST /api/logout

use axum::extract::State;
use serde_json::{json, Value};

use crate::dispatch::{RoutineCall, RoutineName, RpcParam};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, Identity};
use crate::state::AppState;

const USER_LOOKUP: &str = "get_user_by_id";

/// GET /api/me - the acting user's row from `get_user_by_id`
pub async fn me(State(state): State<AppState>, Identity(actor): Identity) -> ApiResult<Value> {
    let user = actor.ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let call = RoutineCall::function(
        RoutineName::parse(USER_LOOKUP)?,
        &[RpcParam::Scalar(json!(user.id()))],
    )?;
    let row = state
        .executor
        .execute(&call, None)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found(format!("User {} not found", user)))?;

    Ok(ApiResponse::success(Value::Object(row)))
}

/// POST /api/logout - expire the identity cookie
pub async fn logout(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({ "loggedOut": true })).with_cookie(Some(state.cookies.logout())))
}
