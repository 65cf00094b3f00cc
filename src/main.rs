use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use geo_rooms_server::config::ServerConfig;
use geo_rooms_server::game::location::LocationCatalog;
use geo_rooms_server::lobby::RoomRegistry;
use geo_rooms_server::metrics::Metrics;
use geo_rooms_server::net::http::start_control_server;
use geo_rooms_server::net::tls::TlsConfig;
use geo_rooms_server::net::transport::WebTransportServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Geo Rooms Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate().context("Invalid configuration")?;
    info!(
        "Configuration loaded: {}:{} (http {}), max_rooms={}",
        config.bind_address, config.port, config.http_port, config.max_rooms
    );

    let catalog = LocationCatalog::load(&config.locations_path)
        .with_context(|| format!("Failed to load locations from {}", config.locations_path.display()))?;
    catalog
        .ensure_rounds(config.room.total_rounds)
        .context("Location catalog cannot fill a game")?;

    let metrics = Arc::new(Metrics::new());
    let registry = RoomRegistry::new(
        Arc::new(catalog),
        config.room.clone(),
        config.max_rooms,
        metrics,
    );

    let http_registry = registry.clone();
    let (bind_address, http_port) = (config.bind_address, config.http_port);
    tokio::spawn(async move {
        if let Err(e) = start_control_server(http_registry, bind_address, http_port).await {
            error!("Control server error: {}", e);
        }
    });

    let tls_config = TlsConfig::load(config.tls_cert_path.as_deref(), config.tls_key_path.as_deref())
        .await
        .context("Failed to set up TLS")?;
    let server = WebTransportServer::new(config.clone(), tls_config, registry.clone());

    info!("Server ready on https://{}", server.bind_addr());
    info!("Certificate hash: {}", server.cert_hash());

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    let stopped = registry.shutdown_all();
    info!("Server stopped ({} rooms closed)", stopped);

    Ok(())
}
