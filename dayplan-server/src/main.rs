//! Dayplan server -- personal daily-activity planner.
//!
//! Serves the task API and web client over HTTP, pushes live updates
//! to open browser sessions over WebSocket, and optionally records
//! ambient weather in the background.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8080 with ./data as the data root
//! cargo run --bin dayplan-server
//!
//! # Custom address and data directory
//! cargo run --bin dayplan-server -- --bind 127.0.0.1:3000 --data-dir ~/plans
//!
//! # Enable weather polling
//! OPENWEATHER_API_KEY=... cargo run --bin dayplan-server
//! ```

use std::sync::Arc;

use clap::Parser;

use dayplan_server::config::{CliArgs, ServerConfig};
use dayplan_server::server::{self, AppState};
use dayplan_server::weather::WeatherService;

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        data_dir = %config.data_dir.display(),
        "starting dayplan server"
    );

    if let Some(service) = WeatherService::from_config(&config) {
        service.spawn_poller();
        tracing::info!("weather polling enabled");
    } else {
        tracing::info!("weather polling disabled (no API key configured)");
    }

    let state = Arc::new(AppState::new(&config));

    match server::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "dayplan server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    }
}
