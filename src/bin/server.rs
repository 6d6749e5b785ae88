use log::{error, info, warn};
use std::sync::Arc;

use agent_sync::config::ServerConfig;
use agent_sync::constants::{WS_PATH, WS_PATH_PREFIX};
use agent_sync::core::{PreviewProcessor, SyncServer};
use agent_sync::handlers::routes;

#[tokio::main]
async fn main() {
    // Initialize env
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Load config from environment
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, cors_origins={:?}, development_mode={}",
        config.host, config.port, config.cors_origins, config.development_mode
    );

    let server = Arc::new(SyncServer::from_config(
        &config,
        Arc::new(PreviewProcessor::new()),
    ));

    // Build the server address
    let addr = match config.resolve_addr().await {
        Ok(addr) => addr,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let (bound, serving) = match warp::serve(routes(server, &config))
        .try_bind_with_graceful_shutdown(addr, shutdown_signal())
    {
        Ok(bound) => bound,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting Agent Sync server on {} (ws://{}/{}/{})",
        bound, bound, WS_PATH_PREFIX, WS_PATH
    );
    serving.await;
    info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
