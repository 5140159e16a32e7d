use thiserror::Error;

use super::RoutineKind;
use crate::database::manager::DatabaseError;

/// SQLSTATE for "undefined function", raised for missing routines and for
/// argument lists that match no overload.
pub const UNDEFINED_FUNCTION: &str = "42883";

/// SQLSTATE for `CALL` on a function or `SELECT` from a procedure.
pub const WRONG_OBJECT_TYPE: &str = "42809";

/// Error reported by PostgreSQL while running a routine.
#[derive(Debug, Clone, PartialEq)]
pub struct PgFailure {
    pub code: Option<String>,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid routine name: {0:?}")]
    InvalidName(String),

    #[error("Invalid SQL type {type_name:?} for parameter ${position}")]
    InvalidType { position: usize, type_name: String },

    #[error("{} {name} does not exist", .kind.label())]
    RoutineMissing { kind: RoutineKind, name: String },

    #[error("{name} is a {}, not a {}; call it through /api/{}/{name}", .actual.noun(), .requested.noun(), .actual.noun())]
    WrongKind {
        requested: RoutineKind,
        actual: RoutineKind,
        name: String,
    },

    #[error("{} {name} exists but no overload accepts ({}). Available signatures: {}", .kind.label(), .supplied.join(", "), .available.join("; "))]
    SignatureMismatch {
        kind: RoutineKind,
        name: String,
        supplied: Vec<String>,
        available: Vec<String>,
    },

    #[error("{}", .0.message)]
    Postgres(PgFailure),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl DispatchError {
    /// Split a sqlx error into a PostgreSQL-reported failure or an
    /// infrastructure failure (pool, I/O, protocol).
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let (detail, hint) = match db_err.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
                    Some(pg) => (pg.detail().map(str::to_string), pg.hint().map(str::to_string)),
                    None => (None, None),
                };
                DispatchError::Postgres(PgFailure {
                    code: db_err.code().map(|c| c.into_owned()),
                    message: db_err.message().to_string(),
                    detail,
                    hint,
                })
            }
            other => DispatchError::Database(DatabaseError::Sqlx(other)),
        }
    }

    /// SQLSTATE carried by this error, if it came from PostgreSQL.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            DispatchError::Postgres(failure) => failure.code.as_deref(),
            DispatchError::RoutineMissing { .. } | DispatchError::SignatureMismatch { .. } => {
                Some(UNDEFINED_FUNCTION)
            }
            DispatchError::WrongKind { .. } => Some(WRONG_OBJECT_TYPE),
            _ => None,
        }
    }

    /// Failures worth explaining from `pg_proc`.
    pub fn needs_diagnosis(&self) -> bool {
        matches!(
            self,
            DispatchError::Postgres(PgFailure { code: Some(code), .. })
                if code == UNDEFINED_FUNCTION || code == WRONG_OBJECT_TYPE
        )
    }
}
