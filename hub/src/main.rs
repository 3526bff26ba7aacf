mod errors;
mod history;
mod ingest;
mod metrics;
mod model;
mod persist;
mod rest;
mod store;

use axum::{routing::get, Router};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let http_addr = env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let data_dir: PathBuf = env::var("DATA_DIR")
        .unwrap_or_else(|_| "data".to_string())
        .into();
    let snapshot_interval_ms: u64 = env::var("SNAPSHOT_INTERVAL_MS")
        .unwrap_or_else(|_| "250".to_string())
        .parse()
        .unwrap_or(250);

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting telemetry hub");
    info!("HTTP server: {}", http_addr);
    info!("Data dir: {}", data_dir.display());

    // Initialize metrics
    metrics::init_metrics();

    // Restore the previous snapshot; absent files mean a fresh store
    let store = match persist::load(&data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to load snapshot: {}", e);
            std::process::exit(1);
        }
    };
    info!("Loaded {} channels from snapshot", store.channel_count());
    metrics::CHANNELS_TOTAL.set(store.channel_count() as f64);

    let (snapshots, snapshot_rx) = persist::snapshot_channel();
    let gateway = Arc::new(ingest::IngestionGateway::new(store.clone(), snapshots));

    if store.channel_count() == 0 {
        match seed_sample_channel(&gateway) {
            Ok(id) => info!("Seeded sample channel {}", id),
            Err(e) => error!("Failed to seed sample channel: {}", e),
        }
    }

    // Spawn snapshot writer task
    let snapshot_store = store.clone();
    let snapshot_dir = data_dir.clone();
    let snapshot_handle = tokio::spawn(async move {
        persist::run_snapshotter(
            snapshot_rx,
            snapshot_store,
            snapshot_dir,
            snapshot_interval_ms,
        )
        .await;
    });

    // Build HTTP app with REST API and metrics endpoint
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(store.clone(), gateway));

    // Start HTTP server
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .unwrap_or_else(|e| {
            error!("Failed to bind to {}: {}", http_addr, e);
            std::process::exit(1);
        });

    info!("HTTP server listening on {}", http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = snapshot_handle => {
            error!("Snapshotter terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    // Final snapshot so nothing accepted since the last tick is lost
    if let Err(e) = persist::save(&store, &data_dir) {
        error!("Failed to write final snapshot: {}", e);
    }

    info!("Shutting down");
}

/// First-boot convenience: an example channel with one seeded entry, so the
/// API has something to show before any device registers.
fn seed_sample_channel(gateway: &ingest::IngestionGateway) -> errors::Result<String> {
    let channel = gateway.create_channel(
        "Temperature Monitor",
        "A channel for monitoring temperature and humidity",
        &[
            "Temperature".to_string(),
            "Humidity".to_string(),
            "Pressure".to_string(),
            "Battery".to_string(),
        ],
    )?;

    let values = BTreeMap::from([(1, 22.5), (2, 45.0), (3, 1013.2), (4, 98.0)]);
    gateway.update_fields(&channel.id, &channel.api_key, &values)?;

    Ok(channel.id)
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
