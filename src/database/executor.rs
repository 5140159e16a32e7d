use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::diagnose;
use super::manager::{Database, DatabaseError};
use super::rows::{self, Row};
use crate::dispatch::{sql, DispatchError, RoutineCall, RoutineKind};
use crate::types::ActingUser;

const PRIVILEGE_SQL: &str = "SELECT user_has_privilege($1::INTEGER, $2::TEXT) AS allowed";

const REGISTERED_USER_SQL: &str = r#"
    SELECT row_to_json(t) AS row FROM (
        SELECT cod, email_usu, primer_nombre_usu, primer_apellido_usu, fk_cod_rol
        FROM usuario
        WHERE email_usu = $1
        ORDER BY cod DESC
        LIMIT 1
    ) t
"#;

/// Everything the HTTP layer needs from the database.
#[async_trait]
pub trait RoutineExecutor: Send + Sync {
    /// Run a routine. With an acting user the call runs inside a transaction
    /// that first publishes the user through `set_config`; the transaction
    /// commits only if the routine succeeds.
    async fn execute(&self, call: &RoutineCall, actor: Option<ActingUser>) -> Result<Vec<Row>, DispatchError>;

    async fn user_has_privilege(&self, user: ActingUser, privilege: &str) -> Result<bool, DispatchError>;

    /// Row created by `register_user`, looked up by e-mail.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<Row>, DispatchError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// PostgreSQL-backed executor.
pub struct PgExecutor {
    db: Database,
    slow_query_threshold: Duration,
}

impl PgExecutor {
    pub fn new(db: Database, slow_query_threshold: Duration) -> Self {
        Self { db, slow_query_threshold }
    }

    async fn execute_anonymous(&self, call: &RoutineCall, statement: &str) -> Result<Vec<Row>, DispatchError> {
        let mut conn = self.db.pool().acquire().await.map_err(DispatchError::from_sqlx)?;
        run(&mut conn, call, statement).await.map_err(DispatchError::from_sqlx)
    }

    async fn execute_as(
        &self,
        user: ActingUser,
        call: &RoutineCall,
        statement: &str,
    ) -> Result<Vec<Row>, DispatchError> {
        let mut tx = self.db.pool().begin().await.map_err(DispatchError::from_sqlx)?;

        sqlx::query(sql::SET_ACTING_USER)
            .bind(user.to_string())
            .execute(&mut *tx)
            .await
            .map_err(DispatchError::from_sqlx)?;

        match run(&mut tx, call, statement).await {
            Ok(rows) => {
                tx.commit().await.map_err(DispatchError::from_sqlx)?;
                Ok(rows)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback after failed {} {} also failed: {}", call.kind.noun(), call.name, rollback_err);
                } else {
                    debug!("Rolled back audit transaction for {} {}", call.kind.noun(), call.name);
                }
                Err(DispatchError::from_sqlx(err))
            }
        }
    }

    /// Replace a bare 42883 or 42809 with a diagnosis from `pg_proc`. If the lookup
    /// itself fails the original error is kept.
    async fn diagnose(&self, call: &RoutineCall, original: DispatchError) -> DispatchError {
        match diagnose::lookup(self.db.pool(), call.name.as_str()).await {
            Ok(found) => diagnose::classify(call, &found),
            Err(e) => {
                warn!("Could not inspect pg_proc for {}: {}", call.name, e);
                original
            }
        }
    }
}

#[async_trait]
impl RoutineExecutor for PgExecutor {
    async fn execute(&self, call: &RoutineCall, actor: Option<ActingUser>) -> Result<Vec<Row>, DispatchError> {
        let statement = sql::render(call);
        info!(
            kind = call.kind.noun(),
            routine = %call.name,
            params = call.params.len(),
            actor = ?actor.map(|a| a.id()),
            "Dispatching routine"
        );
        debug!(sql = %statement, "Rendered routine call");

        let started = Instant::now();
        let result = match actor {
            Some(user) => self.execute_as(user, call, &statement).await,
            None => self.execute_anonymous(call, &statement).await,
        };

        let elapsed = started.elapsed();
        if elapsed > self.slow_query_threshold {
            warn!("Slow {} {}: {:?}", call.kind.noun(), call.name, elapsed);
        }

        match result {
            Err(err) if err.needs_diagnosis() => Err(self.diagnose(call, err).await),
            Err(err) => {
                warn!("{} {} failed: {}", call.kind.label(), call.name, err);
                Err(err)
            }
            ok => ok,
        }
    }

    async fn user_has_privilege(&self, user: ActingUser, privilege: &str) -> Result<bool, DispatchError> {
        let allowed: Option<bool> = sqlx::query_scalar(PRIVILEGE_SQL)
            .bind(user.id())
            .bind(privilege)
            .fetch_one(self.db.pool())
            .await
            .map_err(DispatchError::from_sqlx)?;
        Ok(allowed.unwrap_or(false))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<Row>, DispatchError> {
        let row = sqlx::query(REGISTERED_USER_SQL)
            .bind(email)
            .fetch_optional(self.db.pool())
            .await
            .map_err(DispatchError::from_sqlx)?;
        row.as_ref()
            .map(rows::wrapped_row)
            .transpose()
            .map_err(DispatchError::from_sqlx)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.db.health_check().await
    }
}

/// Execute the rendered statement on one connection and decode its rows.
async fn run(conn: &mut PgConnection, call: &RoutineCall, statement: &str) -> Result<Vec<Row>, sqlx::Error> {
    let mut query = sqlx::query(statement);
    for param in &call.params {
        query = query.bind(param.text.as_deref());
    }

    let fetched = query.fetch_all(&mut *conn).await?;
    match call.kind {
        RoutineKind::Procedure => Ok(fetched.iter().map(rows::row_to_json).collect()),
        RoutineKind::Function => fetched.iter().map(rows::wrapped_row).collect(),
    }
}
