use viajes_gateway::{config, init_tracing, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DB_HOST, DB_PASSWORD, etc.
    let _ = dotenvy::dotenv();

    init_tracing();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting ViajesUCAB gateway in {:?} mode", config.environment);

    server::serve(config).await
}
