use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;

use chess_arena::config::ServerConfig;
use chess_arena::core::GameServer;
use chess_arena::handlers::routes;

#[tokio::main]
async fn main() {
    // Initialize env
    let env_loaded = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match env_loaded {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, match interval={:?}",
        config.host, config.port, config.match_interval
    );

    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    let server = Arc::new(GameServer::in_memory(&config));
    let _matchmaking = server.start_matchmaking();

    info!("Starting chess arena server on {}", addr);
    warp::serve(routes(server)).run(addr).await;
}
