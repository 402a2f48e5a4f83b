mod aggregator;
mod config;
mod models;
mod scheduler;
mod signalk;
mod utils;
mod windy;

use log::{error, info};
use std::sync::Arc;
use tokio::time::Duration;

use aggregator::{Aggregator, FoldRules};
use config::StationConfig;
use scheduler::{run_flush_loop, run_status_loop};
use signalk::run_ingest;
use windy::WindyClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration; nothing is started without a valid one
    let config = match StationConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let client = match WindyClient::new(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create HTTP client: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Submitting weather report for station {} to {}<api key> every {} minutes",
        config.station_id, config.api_base, config.submit_interval_minutes
    );

    let aggregator = Arc::new(Aggregator::new(FoldRules::from(&config)));
    let status_every = Duration::from_secs(config.status_interval_secs);
    let signalk_addr = config.signalk_addr.clone();
    let config = Arc::new(config);

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    // Run until shutdown; unsubmitted readings are dropped
    tokio::select! {
        _ = run_ingest(signalk_addr, Arc::clone(&aggregator)) => {}
        _ = run_flush_loop(Arc::clone(&aggregator), client, config) => {}
        _ = run_status_loop(Arc::clone(&aggregator), status_every) => {}
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    let pending = aggregator.pending();
    if !pending.is_empty() {
        info!(
            "Dropping unsubmitted readings ({} wind samples pending)",
            pending.wind_speed.len()
        );
    }

    Ok(())
}
