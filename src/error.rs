// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::DatabaseError;
use crate::dispatch::DispatchError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 401/403 from the privilege guard
    PrivilegeDenied {
        status: u16,
        message: String,
        required_privilege: String,
    },

    // 404 Not Found
    NotFound(String),

    // 500 raised by PostgreSQL while running a routine
    Routine {
        message: String,
        sqlstate: Option<String>,
        detail: Option<String>,
        hint: Option<String>,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::PrivilegeDenied { status, .. } => *status,
            ApiError::NotFound(_) => 404,
            ApiError::Routine { .. } => 500,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::PrivilegeDenied { message, .. } => message,
            ApiError::NotFound(msg) => msg,
            ApiError::Routine { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling. Routine failures report the
    /// PostgreSQL SQLSTATE instead.
    pub fn error_code(&self) -> &str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::PrivilegeDenied { .. } => "PRIVILEGE_DENIED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Routine { sqlstate, .. } => sqlstate.as_deref().unwrap_or("DATABASE_ERROR"),
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        });

        match self {
            ApiError::PrivilegeDenied { required_privilege, .. } => {
                response["allowed"] = json!(false);
                response["requiredPrivilege"] = json!(required_privilege);
            }
            ApiError::Routine { detail, hint, .. } => {
                if let Some(detail) = detail {
                    response["detail"] = json!(detail);
                }
                if let Some(hint) = hint {
                    response["hint"] = json!(hint);
                }
            }
            _ => {}
        }

        response
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn privilege_denied(status: u16, message: impl Into<String>, privilege: impl Into<String>) -> Self {
        ApiError::PrivilegeDenied {
            status,
            message: message.into(),
            required_privilege: privilege.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        if err.is_unavailable() {
            tracing::error!("Database unavailable: {}", err);
            return ApiError::service_unavailable("Database temporarily unavailable");
        }
        tracing::error!("Database error: {}", err);
        ApiError::internal_server_error(err.to_string())
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            invalid @ (DispatchError::InvalidName(_) | DispatchError::InvalidType { .. }) => {
                ApiError::bad_request(invalid.to_string())
            }
            DispatchError::Postgres(failure) => ApiError::Routine {
                message: failure.message,
                sqlstate: failure.code,
                detail: failure.detail,
                hint: failure.hint,
            },
            DispatchError::Database(db) => db.into(),
            diagnosed @ (DispatchError::RoutineMissing { .. }
            | DispatchError::WrongKind { .. }
            | DispatchError::SignatureMismatch { .. }) => ApiError::Routine {
                sqlstate: diagnosed.sqlstate().map(str::to_string),
                message: diagnosed.to_string(),
                detail: None,
                hint: None,
            },
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
