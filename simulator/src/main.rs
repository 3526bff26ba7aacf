mod readings;

use readings::Reading;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    id: String,
    api_key: String,
}

#[tokio::main]
async fn main() {
    let hub_url = env::var("HUB_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    let rate: u64 = env::var("RATE")
        .unwrap_or_else(|_| "1".to_string())
        .parse()
        .unwrap_or(1);
    let channel_id = env::var("CHANNEL_ID").ok();
    let api_key = env::var("API_KEY").ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting device simulator");
    info!("Hub: {}, rate: {} update(s)/s", hub_url, rate);

    let client = reqwest::Client::new();

    // Reuse the configured channel, or register a fresh one
    let (channel_id, api_key) = match (channel_id, api_key) {
        (Some(id), Some(key)) => (id, key),
        _ => match register_channel(&client, &hub_url).await {
            Ok(channel) => {
                info!(
                    "Registered channel {} (api key {})",
                    channel.id, channel.api_key
                );
                (channel.id, channel.api_key)
            }
            Err(e) => {
                error!("Failed to register channel: {}", e);
                std::process::exit(1);
            }
        },
    };

    let update_url = format!(
        "{}/api/v1/channels/{}/update/{}",
        hub_url, channel_id, api_key
    );
    let update_interval = Duration::from_millis(1000 / rate.max(1));
    let mut rng = rand::thread_rng();
    let mut counter = 0u64;

    info!("Pushing one update every {:?}", update_interval);

    loop {
        let started = std::time::Instant::now();
        let reading = Reading::random(&mut rng);

        match client
            .post(&update_url)
            .json(&reading.field_map())
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                counter += 1;

                // Log progress periodically
                if counter % 100 == 0 {
                    info!("Pushed {} updates", counter);
                }
            }
            Ok(response) => {
                warn!("Update rejected with status {}", response.status());
            }
            Err(e) => {
                warn!("Failed to push update: {}", e);
            }
        }

        let elapsed = started.elapsed();
        if elapsed < update_interval {
            tokio::time::sleep(update_interval - elapsed).await;
        } else if elapsed > update_interval * 2 {
            warn!(
                "Update took {:?}, target was {:?} - hub may be overloaded",
                elapsed, update_interval
            );
        }
    }
}

async fn register_channel(
    client: &reqwest::Client,
    hub_url: &str,
) -> Result<ChannelInfo, reqwest::Error> {
    client
        .post(format!("{}/api/v1/channels", hub_url))
        .json(&serde_json::json!({
            "name": "Simulated Device",
            "description": "Synthetic readings pushed by the simulator",
            "field_names": ["Temperature", "Humidity", "Pressure", "Battery"]
        }))
        .send()
        .await?
        .json()
        .await
}
