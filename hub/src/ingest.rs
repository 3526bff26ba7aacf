use crate::errors::Result;
use crate::metrics::{
    CHANNELS_TOTAL, DROPPED_FIELD_KEYS_TOTAL, UNAUTHORIZED_TOTAL, UPDATES_TOTAL,
    UPDATE_LATENCY_SECONDS,
};
use crate::model::{Channel, DataPoint};
use crate::persist::SnapshotHandle;
use crate::store::ChannelStore;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Applies authorized mutations to the store and nudges the snapshot task
/// after each one. Reads go straight to the store; everything that writes
/// goes through here.
pub struct IngestionGateway {
    store: Arc<ChannelStore>,
    snapshots: SnapshotHandle,
}

impl IngestionGateway {
    pub fn new(store: Arc<ChannelStore>, snapshots: SnapshotHandle) -> Self {
        Self { store, snapshots }
    }

    pub fn create_channel(
        &self,
        name: &str,
        description: &str,
        field_names: &[String],
    ) -> Result<Channel> {
        let channel = self.store.create_channel(name, description, field_names)?;
        CHANNELS_TOTAL.set(self.store.channel_count() as f64);
        self.snapshots.notify();
        Ok(channel)
    }

    /// Apply one update call: a sparse map of field id to value. Values for
    /// undeclared field ids are dropped without failing the call. The entry
    /// counter advances by exactly 1 whether zero or eight fields changed,
    /// and the returned entry id is the counter's new value.
    pub fn update_fields(
        &self,
        channel_id: &str,
        api_key: &str,
        values: &BTreeMap<u8, f64>,
    ) -> Result<u64> {
        let start = Instant::now();

        let slot = self.store.slot(channel_id)?;
        let mut slot = slot.lock().unwrap();

        if let Err(e) = slot.authorize(api_key) {
            UNAUTHORIZED_TOTAL.inc();
            return Err(e);
        }

        let now = Utc::now();
        let mut applied = 0;

        for (&field_id, &value) in values {
            match slot.channel.fields.get_mut(&field_id) {
                Some(field) => {
                    field.value = value;
                    field.last_updated = now;
                }
                None => {
                    DROPPED_FIELD_KEYS_TOTAL.inc();
                    continue;
                }
            }
            slot.append(
                field_id,
                DataPoint {
                    value,
                    timestamp: now,
                },
            );
            applied += 1;
        }

        slot.channel.last_entry_id += 1;
        let entry_id = slot.channel.last_entry_id;
        drop(slot);

        UPDATES_TOTAL.inc();
        UPDATE_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
        debug!(
            "Channel {} entry {} ({}/{} keys applied)",
            channel_id,
            entry_id,
            applied,
            values.len()
        );

        self.snapshots.notify();
        Ok(entry_id)
    }
}

/// Reduce a bulk payload's string keys to numeric field ids. Non-numeric
/// keys are dropped, not rejected; devices with partially broken payloads
/// still get their valid fields through.
pub fn parse_field_keys(raw: &HashMap<String, f64>) -> BTreeMap<u8, f64> {
    let mut values = BTreeMap::new();
    for (key, &value) in raw {
        match key.parse::<u8>() {
            Ok(field_id) => {
                values.insert(field_id, value);
            }
            Err(_) => {
                DROPPED_FIELD_KEYS_TOTAL.inc();
            }
        }
    }
    values
}
