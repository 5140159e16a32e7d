use crate::config;
use crate::server;

pub async fn handle() -> anyhow::Result<()> {
    let config = config::config();
    tracing::info!("Starting ViajesUCAB gateway in {:?} mode", config.environment);
    server::serve(config).await
}
