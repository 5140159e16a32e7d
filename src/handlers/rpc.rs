// handlers/rpc.rs - POST /api/procedure/:name and POST /api/function/:name

use axum::{
    body::Bytes,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::Value;

use super::hooks;
use crate::dispatch::{RoutineCall, RoutineKind, RoutineName, RpcParam};
use crate::error::ApiError;
use crate::middleware::{privilege, ApiResult, Identity};
use crate::state::AppState;
use crate::types::ActingUser;

/// Request body: `{"params": [...]}`. A missing body, a missing key and
/// `null` all mean no parameters.
#[derive(Debug, Default, Deserialize)]
pub struct RoutineRequest {
    #[serde(default)]
    pub params: Option<Vec<RpcParam>>,
}

impl RoutineRequest {
    pub fn parse(body: &[u8]) -> Result<Vec<RpcParam>, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let request: RoutineRequest = serde_json::from_slice(body)
            .map_err(|e| ApiError::invalid_json(format!("Invalid request body: {}", e)))?;
        Ok(request.params.unwrap_or_default())
    }
}

/// POST /api/procedure/:name - `CALL name(...)`, `data` is the first row
pub async fn procedure(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Identity(actor): Identity,
    body: Bytes,
) -> ApiResult<Value> {
    dispatch(&state, RoutineKind::Procedure, &name, actor, &body).await
}

/// POST /api/function/:name - `SELECT * FROM name(...)`, `data` is every row
pub async fn function(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Identity(actor): Identity,
    body: Bytes,
) -> ApiResult<Value> {
    dispatch(&state, RoutineKind::Function, &name, actor, &body).await
}

async fn dispatch(
    state: &AppState,
    kind: RoutineKind,
    raw_name: &str,
    actor: Option<ActingUser>,
    body: &[u8],
) -> ApiResult<Value> {
    // Name and parameter types are checked before anything reaches the database.
    let name = RoutineName::parse(raw_name)?;
    let params = RoutineRequest::parse(body)?;
    let call = RoutineCall::new(kind, name, &params)?;

    privilege::authorize(state.executor.as_ref(), &call.name, &params, actor).await?;

    let rows = state.executor.execute(&call, actor).await?;
    hooks::finish(state, &call, &params, rows).await
}
