//! Follow-up behaviour for the two routines whose results need more than a
//! plain relay: `register_user` and `authenticate_user`.

use serde_json::Value;
use tracing::{debug, warn};

use crate::database::Row;
use crate::dispatch::{RoutineCall, RoutineKind, RpcParam};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;
use crate::types::ActingUser;

const REGISTER_USER: &str = "register_user";
const AUTHENTICATE_USER: &str = "authenticate_user";

/// OUT parameter of `authenticate_user` holding the user id.
const AUTHENTICATED_ID: &str = "p_cod";

/// Build the response for a successful routine call.
pub async fn finish(state: &AppState, call: &RoutineCall, params: &[RpcParam], rows: Vec<Row>) -> ApiResult<Value> {
    match call.name.as_str() {
        REGISTER_USER => registered_user(state, call.kind, params, rows).await,
        AUTHENTICATE_USER => Ok(authenticated_user(state, call.kind, rows)),
        _ => Ok(ApiResponse::success(shape(call.kind, rows))),
    }
}

/// Procedures answer with their single OUT row (or null), functions with
/// every row.
pub fn shape(kind: RoutineKind, rows: Vec<Row>) -> Value {
    match kind {
        RoutineKind::Procedure => rows.into_iter().next().map(Value::Object).unwrap_or(Value::Null),
        RoutineKind::Function => Value::Array(rows.into_iter().map(Value::Object).collect()),
    }
}

/// `register_user` does not return the row it inserts; fetch it by the
/// e-mail passed as first parameter.
async fn registered_user(
    state: &AppState,
    kind: RoutineKind,
    params: &[RpcParam],
    rows: Vec<Row>,
) -> ApiResult<Value> {
    let Some(email) = params.first().and_then(|p| p.value().as_str()) else {
        warn!("register_user called without an e-mail as first parameter");
        return Ok(ApiResponse::success(shape(kind, rows)));
    };

    match state.executor.find_user_by_email(email).await? {
        Some(user) => {
            debug!("Registered user {}", email);
            Ok(ApiResponse::success(Value::Object(user)))
        }
        None => {
            warn!("register_user succeeded but no usuario row has e-mail {}", email);
            Ok(ApiResponse::success(shape(kind, rows)))
        }
    }
}

/// A successful login returns `p_cod`; it becomes the HttpOnly identity cookie.
fn authenticated_user(state: &AppState, kind: RoutineKind, rows: Vec<Row>) -> ApiResponse<Value> {
    let user = rows
        .first()
        .and_then(|row| row.get(AUTHENTICATED_ID))
        .and_then(id_text)
        .and_then(|id| id.parse::<ActingUser>().ok());

    let cookie = match user {
        Some(user) => {
            debug!("User {} authenticated", user);
            state.cookies.login(&user.to_string())
        }
        None => None,
    };

    ApiResponse::success(shape(kind, rows)).with_cookie(cookie)
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn procedures_yield_first_row_or_null() {
        let rows = vec![row(json!({"p_cod": 1})), row(json!({"p_cod": 2}))];
        assert_eq!(shape(RoutineKind::Procedure, rows), json!({"p_cod": 1}));
        assert_eq!(shape(RoutineKind::Procedure, vec![]), Value::Null);
    }

    #[test]
    fn functions_yield_every_row() {
        let rows = vec![row(json!({"cod": 1})), row(json!({"cod": 2}))];
        assert_eq!(shape(RoutineKind::Function, rows), json!([{"cod": 1}, {"cod": 2}]));
        assert_eq!(shape(RoutineKind::Function, vec![]), json!([]));
    }

    #[test]
    fn ids_come_from_numbers_or_strings() {
        assert_eq!(id_text(&json!(42)), Some("42".into()));
        assert_eq!(id_text(&json!(" 42 ")), Some("42".into()));
        assert_eq!(id_text(&Value::Null), None);
        assert_eq!(id_text(&json!("")), None);
    }
}
