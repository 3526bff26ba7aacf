use crate::errors::{Error, Result};
use crate::history::HistoryBuffer;
use crate::model::{Channel, DataPoint, Field, MAX_FIELDS};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

const API_KEY_PREFIX: &str = "hub_";

/// Everything guarded by one channel's lock: the channel record plus the
/// history buffer for each declared field. Field writes, the entry counter
/// bump, and history appends for one update commit under a single lock
/// acquisition, so readers never see a half-applied update.
#[derive(Debug)]
pub struct ChannelSlot {
    pub channel: Channel,
    histories: BTreeMap<u8, HistoryBuffer>,
}

impl ChannelSlot {
    pub fn authorize(&self, api_key: &str) -> Result<()> {
        if self.channel.api_key == api_key {
            Ok(())
        } else {
            Err(Error::Unauthorized)
        }
    }

    /// Append a sample to one field's history. Unknown field ids are
    /// ignored: callers feed whatever the device sent, declared or not.
    pub fn append(&mut self, field_id: u8, point: DataPoint) {
        if let Some(buffer) = self.histories.get_mut(&field_id) {
            buffer.push(point);
        }
    }

    fn history(&self, field_id: u8) -> Option<&HistoryBuffer> {
        self.histories.get(&field_id)
    }
}

/// In-memory channel and history tables. The outer map is locked only for
/// registration and lookup; all per-channel state sits behind that
/// channel's own mutex, so devices on different channels do not contend.
#[derive(Debug, Default)]
pub struct ChannelStore {
    channels: RwLock<HashMap<String, Arc<Mutex<ChannelSlot>>>>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new channel with one field per non-empty name, numbered
    /// 1..k in input order. Names beyond the eighth are dropped. An empty
    /// history buffer is created alongside every field; buffers are never
    /// created lazily after this point.
    pub fn create_channel(
        &self,
        name: &str,
        description: &str,
        field_names: &[String],
    ) -> Result<Channel> {
        if name.trim().is_empty() {
            return Err(Error::Validation("channel name cannot be empty".to_string()));
        }

        let now = Utc::now();
        let mut fields = BTreeMap::new();
        let mut histories = BTreeMap::new();

        for (i, field_name) in field_names
            .iter()
            .filter(|n| !n.is_empty())
            .take(MAX_FIELDS)
            .enumerate()
        {
            let field_id = (i + 1) as u8;
            fields.insert(
                field_id,
                Field {
                    field_id,
                    name: field_name.clone(),
                    value: 0.0,
                    last_updated: now,
                },
            );
            histories.insert(field_id, HistoryBuffer::new());
        }

        let channel = Channel {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            api_key: format!("{}{}", API_KEY_PREFIX, Uuid::new_v4()),
            fields,
            created_at: now,
            last_entry_id: 0,
        };

        let slot = ChannelSlot {
            channel: channel.clone(),
            histories,
        };

        self.channels
            .write()
            .unwrap()
            .insert(channel.id.clone(), Arc::new(Mutex::new(slot)));

        info!(
            "Created channel {} ({} fields)",
            channel.id,
            channel.fields.len()
        );

        Ok(channel)
    }

    pub fn slot(&self, channel_id: &str) -> Result<Arc<Mutex<ChannelSlot>>> {
        self.channels
            .read()
            .unwrap()
            .get(channel_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Channel {}", channel_id)))
    }

    pub fn get_channel(&self, channel_id: &str) -> Result<Channel> {
        let slot = self.slot(channel_id)?;
        let slot = slot.lock().unwrap();
        Ok(slot.channel.clone())
    }

    pub fn get_field(&self, channel_id: &str, field_id: u8) -> Result<Field> {
        let slot = self.slot(channel_id)?;
        let slot = slot.lock().unwrap();
        slot.channel
            .fields
            .get(&field_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Field {}", field_id)))
    }

    /// Last `n` samples for one field, oldest first.
    pub fn recent(&self, channel_id: &str, field_id: u8, n: usize) -> Result<Vec<DataPoint>> {
        let slot = self.slot(channel_id)?;
        let slot = slot.lock().unwrap();
        let buffer = slot
            .history(field_id)
            .ok_or_else(|| Error::NotFound(format!("Data for field {}", field_id)))?;
        Ok(buffer.recent(n))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().unwrap().len()
    }

    /// Clone both tables for snapshot serialization.
    pub fn export(
        &self,
    ) -> (
        HashMap<String, Channel>,
        HashMap<String, BTreeMap<u8, Vec<DataPoint>>>,
    ) {
        let channels = self.channels.read().unwrap();
        let mut channel_table = HashMap::with_capacity(channels.len());
        let mut history_table = HashMap::with_capacity(channels.len());

        for (id, slot) in channels.iter() {
            let slot = slot.lock().unwrap();
            channel_table.insert(id.clone(), slot.channel.clone());
            history_table.insert(
                id.clone(),
                slot.histories
                    .iter()
                    .map(|(field_id, buffer)| (*field_id, buffer.to_vec()))
                    .collect(),
            );
        }

        (channel_table, history_table)
    }

    /// Rebuild the store from snapshot tables. Every declared field gets a
    /// buffer even when the snapshot holds no points for it; stored points
    /// for fields a channel no longer declares are dropped.
    pub fn restore(
        channels: HashMap<String, Channel>,
        mut histories: HashMap<String, BTreeMap<u8, Vec<DataPoint>>>,
    ) -> Self {
        let mut table = HashMap::with_capacity(channels.len());

        for (id, channel) in channels {
            let mut stored = histories.remove(&id).unwrap_or_default();
            let buffers = channel
                .fields
                .keys()
                .map(|field_id| {
                    let points = stored.remove(field_id).unwrap_or_default();
                    (*field_id, HistoryBuffer::from_points(points))
                })
                .collect();

            let slot = ChannelSlot {
                channel,
                histories: buffers,
            };
            table.insert(id, Arc::new(Mutex::new(slot)));
        }

        Self {
            channels: RwLock::new(table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_channel_numbers_fields_in_order() {
        let store = ChannelStore::new();
        let channel = store
            .create_channel("Weather", "", &names(&["Temperature", "Humidity"]))
            .unwrap();

        assert_eq!(channel.fields.len(), 2);
        assert_eq!(channel.fields[&1].name, "Temperature");
        assert_eq!(channel.fields[&2].name, "Humidity");
        assert_eq!(channel.last_entry_id, 0);
        assert!(channel.api_key.starts_with(API_KEY_PREFIX));
    }

    #[test]
    fn test_create_channel_skips_empty_names_and_truncates() {
        let store = ChannelStore::new();
        let channel = store
            .create_channel(
                "Big",
                "",
                &names(&["a", "", "b", "c", "d", "e", "f", "g", "h", "i"]),
            )
            .unwrap();

        assert_eq!(channel.fields.len(), MAX_FIELDS);
        assert_eq!(channel.fields[&1].name, "a");
        assert_eq!(channel.fields[&2].name, "b");
        assert_eq!(channel.fields[&8].name, "h");
    }

    #[test]
    fn test_create_channel_rejects_empty_name() {
        let store = ChannelStore::new();
        let result = store.create_channel("", "", &names(&["a"]));

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(store.channel_count(), 0);
    }

    #[test]
    fn test_get_channel_unknown() {
        let store = ChannelStore::new();
        assert!(matches!(
            store.get_channel("nope"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_get_field_undeclared() {
        let store = ChannelStore::new();
        let channel = store.create_channel("Weather", "", &names(&["a"])).unwrap();

        assert!(store.get_field(&channel.id, 1).is_ok());
        assert!(matches!(
            store.get_field(&channel.id, 2),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_recent_empty_buffer_exists_at_creation() {
        let store = ChannelStore::new();
        let channel = store.create_channel("Weather", "", &names(&["a"])).unwrap();

        assert!(store.recent(&channel.id, 1, 10).unwrap().is_empty());
        assert!(matches!(
            store.recent(&channel.id, 2, 10),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_append_ignores_unknown_field() {
        let store = ChannelStore::new();
        let channel = store.create_channel("Weather", "", &names(&["a"])).unwrap();
        let slot = store.slot(&channel.id).unwrap();
        let mut slot = slot.lock().unwrap();

        slot.append(
            5,
            DataPoint {
                value: 1.0,
                timestamp: Utc::now(),
            },
        );

        assert!(slot.history(5).is_none());
        assert!(slot.history(1).unwrap().is_empty());
    }

    #[test]
    fn test_authorize_exact_match_only() {
        let store = ChannelStore::new();
        let channel = store.create_channel("Weather", "", &names(&["a"])).unwrap();
        let slot = store.slot(&channel.id).unwrap();
        let slot = slot.lock().unwrap();

        assert!(slot.authorize(&channel.api_key).is_ok());
        assert!(matches!(
            slot.authorize("hub_wrong"),
            Err(Error::Unauthorized)
        ));
    }
}
