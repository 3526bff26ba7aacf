use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hard cap on fields per channel; extra names are dropped at creation.
pub const MAX_FIELDS: usize = 8;

/// One named numeric slot within a channel, holding the latest reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub field_id: u8,
    pub name: String,
    pub value: f64,
    pub last_updated: DateTime<Utc>,
}

/// A logical telemetry source: up to eight fields sharing one write credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub api_key: String,
    pub fields: BTreeMap<u8, Field>,
    pub created_at: DateTime<Utc>,
    pub last_entry_id: u64,
}

/// One historical sample for a field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Channel creation request
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelCreate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub field_names: Vec<String>,
}

/// Acknowledgement returned for accepted updates
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub entry_id: u64,
}
