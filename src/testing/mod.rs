use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::database::{DatabaseError, Row, RoutineExecutor};
use crate::dispatch::{DispatchError, PgFailure, RoutineCall};
use crate::types::ActingUser;

/// A routine call as the executor saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: RoutineCall,
    pub actor: Option<ActingUser>,
}

/// In-memory executor that records every call and answers from canned data.
/// Routines without a canned answer succeed with no rows.
pub struct RecordingExecutor {
    calls: Mutex<Vec<RecordedCall>>,
    privilege_checks: Mutex<Vec<(i64, String)>>,
    answers: HashMap<String, Result<Vec<Row>, PgFailure>>,
    granted: HashSet<(i64, String)>,
    users_by_email: HashMap<String, Row>,
    healthy: bool,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            privilege_checks: Mutex::new(Vec::new()),
            answers: HashMap::new(),
            granted: HashSet::new(),
            users_by_email: HashMap::new(),
            healthy: true,
        }
    }

    pub fn respond(mut self, routine: &str, rows: Value) -> Self {
        let rows = match rows {
            Value::Array(items) => items.into_iter().map(into_row).collect(),
            other => vec![into_row(other)],
        };
        self.answers.insert(routine.to_string(), Ok(rows));
        self
    }

    pub fn fail(mut self, routine: &str, code: &str, message: &str) -> Self {
        self.answers.insert(
            routine.to_string(),
            Err(PgFailure {
                code: Some(code.to_string()),
                message: message.to_string(),
                detail: None,
                hint: None,
            }),
        );
        self
    }

    pub fn grant(mut self, user: i64, privilege: &str) -> Self {
        self.granted.insert((user, privilege.to_string()));
        self
    }

    pub fn with_user(mut self, email: &str, row: Value) -> Self {
        self.users_by_email.insert(email.to_string(), into_row(row));
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn privilege_checks(&self) -> Vec<(i64, String)> {
        self.privilege_checks.lock().unwrap().clone()
    }
}

fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("canned rows must be objects, got {other}"),
    }
}

#[async_trait]
impl RoutineExecutor for RecordingExecutor {
    async fn execute(&self, call: &RoutineCall, actor: Option<ActingUser>) -> Result<Vec<Row>, DispatchError> {
        self.calls.lock().unwrap().push(RecordedCall {
            call: call.clone(),
            actor,
        });
        match self.answers.get(call.name.as_str()) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(failure)) => Err(DispatchError::Postgres(failure.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn user_has_privilege(&self, user: ActingUser, privilege: &str) -> Result<bool, DispatchError> {
        self.privilege_checks
            .lock()
            .unwrap()
            .push((user.id(), privilege.to_string()));
        Ok(self.granted.contains(&(user.id(), privilege.to_string())))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Row>, DispatchError> {
        Ok(self.users_by_email.get(email).cloned())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        if self.healthy {
            Ok(())
        } else {
            Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut))
        }
    }
}
