use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{ConnectOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DatabaseConfig;

/// Errors from the connection pool and schema tooling
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// True when the database could not be reached at all, as opposed to a
    /// statement failing on a live connection.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DatabaseError::Sqlx(
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
            )
        )
    }
}

/// Owned handle on the PostgreSQL pool. Built once at startup and shared with
/// request handlers through application state.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connection options assembled from the DB_* settings.
    pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .ssl_mode(if config.ssl { PgSslMode::Require } else { PgSslMode::Disable })
            .application_name("viajes-gateway");

        if !config.password.is_empty() {
            options = options.password(&config.password);
        }
        if !config.enable_query_logging {
            options = options.disable_statement_logging();
        }
        options
    }

    fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .after_connect(|_conn, meta| {
                Box::pin(async move {
                    debug!(age = ?meta.age, "Opened database connection");
                    Ok(())
                })
            })
    }

    /// Connect eagerly, failing if the database is unreachable.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = Self::pool_options(config)
            .connect_with(Self::connect_options(config))
            .await?;
        info!("Connected to database {} at {}:{}", config.name, config.host, config.port);
        Ok(Self { pool })
    }

    /// Build the pool without connecting; connections open on first use. The
    /// server starts this way so /api/health can report a degraded database.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let pool = Self::pool_options(config).connect_lazy_with(Self::connect_options(config));
        info!("Database pool configured for {} at {}:{}", config.name, config.host, config.port);
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}
