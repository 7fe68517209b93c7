use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use fabric_analytics::config::{AppConfig, CliArgs};
use fabric_analytics::util::logging::init_tracing;
use fabric_analytics::web;
use fabric_analytics::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Warehouse database: {}, LLM backend: {}",
        config.warehouse.database, config.llm.backend
    );

    // Missing LLM credentials are fatal here, before the server binds.
    let web_config = config.web.clone();
    let app_state = match AppState::new(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Starting Fabric Analytics server on {}:{}",
        web_config.host, web_config.port
    );
    match web::run_server(web_config, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(std::io::Error::other(e.to_string()).into());
        }
    }

    Ok(())
}
