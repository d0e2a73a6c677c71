use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use space_battle_server::config::ServerConfig;
use space_battle_server::metrics::{self, Metrics};
use space_battle_server::net::transport::GameServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Space Battle Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    if let Err(e) = config.validate() {
        anyhow::bail!("Invalid configuration: {}", e);
    }
    info!(
        "Configuration loaded: {}:{}, world {}x{} @ {} Hz, cell {}, ship AOI {}x{}, rocket radius {}",
        config.bind_address,
        config.port,
        config.world.width,
        config.world.height,
        config.world.frame_rate,
        config.world.cell_size,
        config.world.ship_aoi_width,
        config.world.ship_aoi_length,
        config.world.rocket_radius
    );

    let metrics = Arc::new(Metrics::new());

    let metrics_clone = metrics.clone();
    let (bind_address, metrics_port) = (config.bind_address, config.metrics_port);
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, bind_address, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let server = GameServer::bind(&config, metrics.clone()).await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    info!("Server stopped");
    Ok(())
}
