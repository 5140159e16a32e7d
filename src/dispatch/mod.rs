//! Generic routine dispatch: validated names, typed parameters and the SQL
//! statement that invokes a stored procedure or function.

pub mod error;
pub mod name;
pub mod params;
pub mod sql;

use serde::Serialize;

pub use error::{DispatchError, PgFailure, UNDEFINED_FUNCTION, WRONG_OBJECT_TYPE};
pub use name::RoutineName;
pub use params::{BoundParam, RpcParam, SqlType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutineKind {
    /// Invoked with `CALL`; yields at most one row of OUT parameters.
    Procedure,
    /// Invoked with `SELECT * FROM`; yields any number of rows.
    Function,
}

impl RoutineKind {
    pub fn label(&self) -> &'static str {
        match self {
            RoutineKind::Procedure => "Procedure",
            RoutineKind::Function => "Function",
        }
    }

    /// Lowercase form, also the URL segment of the matching endpoint.
    pub fn noun(&self) -> &'static str {
        match self {
            RoutineKind::Procedure => "procedure",
            RoutineKind::Function => "function",
        }
    }

    /// `pg_proc.prokind` code: 'p' for procedures, 'f' for plain functions.
    /// Aggregates and window functions are callable as functions too.
    pub fn from_prokind(code: &str) -> Option<Self> {
        match code {
            "p" => Some(RoutineKind::Procedure),
            "f" | "a" | "w" => Some(RoutineKind::Function),
            _ => None,
        }
    }
}

/// A fully resolved routine invocation, ready to be executed.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineCall {
    pub kind: RoutineKind,
    pub name: RoutineName,
    pub params: Vec<BoundParam>,
}

impl RoutineCall {
    /// Resolve every parameter; the first invalid type name aborts the call.
    pub fn new(kind: RoutineKind, name: RoutineName, params: &[RpcParam]) -> Result<Self, DispatchError> {
        let params = params
            .iter()
            .enumerate()
            .map(|(i, p)| p.resolve(i + 1))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { kind, name, params })
    }

    pub fn procedure(name: RoutineName, params: &[RpcParam]) -> Result<Self, DispatchError> {
        Self::new(RoutineKind::Procedure, name, params)
    }

    pub fn function(name: RoutineName, params: &[RpcParam]) -> Result<Self, DispatchError> {
        Self::new(RoutineKind::Function, name, params)
    }

    /// SQL types of the bound parameters, in order.
    pub fn signature(&self) -> Vec<String> {
        self.params.iter().map(|p| p.sql_type.to_string()).collect()
    }
}
