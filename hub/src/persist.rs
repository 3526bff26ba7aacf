use crate::errors::Result;
use crate::metrics::SNAPSHOT_FAILURES_TOTAL;
use crate::model::{Channel, DataPoint};
use crate::store::ChannelStore;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info};

const CHANNELS_FILE: &str = "channels.json";
const DATA_POINTS_FILE: &str = "data_points.json";

/// Cheap clonable handle for telling the snapshot task that in-memory
/// state changed. A full queue means a write is already pending, so the
/// extra nudge is dropped.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    tx: mpsc::Sender<()>,
}

impl SnapshotHandle {
    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}

pub fn snapshot_channel() -> (SnapshotHandle, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(1);
    (SnapshotHandle { tx }, rx)
}

/// Snapshot writer task. Mutations only mark the store dirty; the actual
/// write happens on the next tick, so a burst of updates costs one write.
/// A failed write is logged and counted, never reported to the caller that
/// triggered it.
pub async fn run_snapshotter(
    mut rx: mpsc::Receiver<()>,
    store: Arc<ChannelStore>,
    data_dir: PathBuf,
    interval_ms: u64,
) {
    info!(
        "Starting snapshotter, data dir {}, interval {}ms",
        data_dir.display(),
        interval_ms
    );

    let mut dirty = false;
    let mut ticker = interval(Duration::from_millis(interval_ms));

    loop {
        tokio::select! {
            nudge = rx.recv() => {
                match nudge {
                    Some(()) => dirty = true,
                    None => {
                        // All handles dropped, write whatever is pending and exit
                        if dirty {
                            write_snapshot(&store, &data_dir);
                        }
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                if dirty {
                    write_snapshot(&store, &data_dir);
                    dirty = false;
                }
            }
        }
    }

    info!("Snapshotter stopped");
}

fn write_snapshot(store: &ChannelStore, data_dir: &Path) {
    match save(store, data_dir) {
        Ok(()) => debug!("Snapshot written to {}", data_dir.display()),
        Err(e) => {
            SNAPSHOT_FAILURES_TOTAL.inc();
            error!("Failed to write snapshot: {}", e);
        }
    }
}

/// Serialize both tables as JSON under `data_dir`.
pub fn save(store: &ChannelStore, data_dir: &Path) -> Result<()> {
    let (channels, histories) = store.export();

    std::fs::create_dir_all(data_dir)?;
    std::fs::write(
        data_dir.join(CHANNELS_FILE),
        serde_json::to_vec(&channels)?,
    )?;
    std::fs::write(
        data_dir.join(DATA_POINTS_FILE),
        serde_json::to_vec(&histories)?,
    )?;

    Ok(())
}

/// Rebuild the store from the files under `data_dir`. Absent files mean a
/// fresh deployment and yield an empty store; unreadable or corrupt files
/// are errors the caller decides about.
pub fn load(data_dir: &Path) -> Result<ChannelStore> {
    let channels: HashMap<String, Channel> = read_table(&data_dir.join(CHANNELS_FILE))?;
    let histories: HashMap<String, BTreeMap<u8, Vec<DataPoint>>> =
        read_table(&data_dir.join(DATA_POINTS_FILE))?;

    Ok(ChannelStore::restore(channels, histories))
}

fn read_table<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}
