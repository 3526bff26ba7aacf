// End-to-end smoke test against a running hub (HTTP_ADDR=0.0.0.0:8000).
// Start the server first, then: cargo test -p hub -- --ignored

use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

const BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    id: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct UpdateAck {
    success: bool,
    entry_id: u64,
}

#[derive(Debug, Deserialize)]
struct FieldInfo {
    field_id: u8,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct Point {
    value: f64,
}

#[tokio::test]
#[ignore]
async fn test_full_device_flow() {
    let client = reqwest::Client::new();

    // Create a channel
    let channel: ChannelInfo = client
        .post(format!("{}/api/v1/channels", BASE_URL))
        .json(&json!({
            "name": "Smoke Test",
            "description": "end-to-end flow",
            "field_names": ["Temperature", "Humidity"]
        }))
        .send()
        .await
        .expect("create channel")
        .json()
        .await
        .expect("parse channel");

    // Positional update, ThingSpeak style
    let ack: UpdateAck = client
        .get(format!(
            "{}/update?channel_id={}&api_key={}&field1=22.5&field2=45.0",
            BASE_URL, channel.id, channel.api_key
        ))
        .send()
        .await
        .expect("positional update")
        .json()
        .await
        .expect("parse ack");

    assert!(ack.success);
    assert_eq!(ack.entry_id, 1);

    // Bulk update with junk keys mixed in
    let mut rng = rand::thread_rng();
    let temperature: f64 = rng.gen_range(15.0..35.0);
    let mut payload = HashMap::new();
    payload.insert("1".to_string(), temperature);
    payload.insert("notafield".to_string(), 1.0);

    let ack: UpdateAck = client
        .post(format!(
            "{}/api/v1/channels/{}/update/{}",
            BASE_URL, channel.id, channel.api_key
        ))
        .json(&payload)
        .send()
        .await
        .expect("bulk update")
        .json()
        .await
        .expect("parse ack");

    assert_eq!(ack.entry_id, 2);

    // Latest value reflects the second update
    let field: FieldInfo = client
        .get(format!(
            "{}/api/v1/channels/{}/fields/1",
            BASE_URL, channel.id
        ))
        .send()
        .await
        .expect("get field")
        .json()
        .await
        .expect("parse field");

    assert_eq!(field.field_id, 1);
    assert_eq!(field.value, temperature);

    // History holds both points in order
    let history: Vec<Point> = client
        .get(format!(
            "{}/api/v1/channels/{}/fields/1/data?results=10",
            BASE_URL, channel.id
        ))
        .send()
        .await
        .expect("get history")
        .json()
        .await
        .expect("parse history");

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].value, 22.5);
    assert_eq!(history[1].value, temperature);

    // Wrong key is rejected without advancing anything
    let status = client
        .get(format!(
            "{}/update?channel_id={}&api_key=hub_wrong&field1=99.0",
            BASE_URL, channel.id
        ))
        .send()
        .await
        .expect("bad key update")
        .status();

    assert_eq!(status.as_u16(), 401);

    let health = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("health")
        .status();
    assert!(health.is_success());
}
