use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::{AppConfig, SecurityConfig};
use crate::database::{Database, PgExecutor};
use crate::handlers::{health, me, rpc};
use crate::middleware::identity::USER_HEADER;
use crate::middleware::CookieSettings;
use crate::state::AppState;

pub fn app(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        // Public
        .route("/", get(health::root))
        .route("/api/health", get(health::health))
        // Session
        .route("/api/me", get(me::me))
        .route("/api/logout", post(me::logout))
        // Routine dispatch
        .route("/api/procedure/:name", post(rpc::procedure))
        .route("/api/function/:name", post(rpc::function))
        // Global middleware
        .layer(DefaultBodyLimit::max(config.server.max_request_size_bytes))
        .layer(cors(&config.security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS for the dashboard origins.
fn cors(security: &SecurityConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = security
        .allowed_origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(USER_HEADER)])
}

/// Build the pool and state from configuration and serve until Ctrl-C.
pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let db = Database::connect_lazy(&config.database);
    let executor = PgExecutor::new(
        db.clone(),
        Duration::from_millis(config.database.slow_query_threshold_ms),
    );
    let state = AppState::new(
        Arc::new(executor),
        CookieSettings {
            secure: config.security.cookie_secure,
        },
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(
        "ViajesUCAB gateway listening on http://{} ({:?}, origins: {})",
        addr,
        config.environment,
        config.security.allowed_origins().join(", ")
    );

    axum::serve(listener, app(state, config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
