//! Durable snapshot of the event queue.
//!
//! The store only moves bytes. Retention is applied by [`load_queue`] at
//! startup and by [`collect_garbage`] on a timer.

pub mod file;
pub mod gc;
pub mod memory;

use thiserror::Error;
use tracing::debug;

use crate::kernel::event::BehaviorEvent;

pub use file::FileSnapshotStore;
pub use gc::collect_garbage;
pub use memory::MemorySnapshotStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A key-value medium scoped to this client, holding one serialized queue.
pub trait SnapshotStore: Send + Sync + 'static {
    /// Raw snapshot, or `None` if nothing was ever written.
    fn read(&self) -> Result<Option<Vec<u8>>, StoreError>;
    fn write(&self, bytes: &[u8]) -> Result<(), StoreError>;

    fn load(&self) -> Result<Vec<BehaviorEvent>, StoreError> {
        match self.read()? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, events: &[BehaviorEvent]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(events)?;
        self.write(&bytes)
    }
}

/// Startup load. Never fails: absence or corruption yields an empty queue.
/// Expired entries are dropped, and if any were, the snapshot is compacted once.
pub fn load_queue(store: &dyn SnapshotStore, now_ms: u64, retention_ms: u64) -> Vec<BehaviorEvent> {
    let mut events = match store.load() {
        Ok(events) => events,
        Err(e) => {
            debug!("Snapshot unreadable, starting empty: {}", e);
            return Vec::new();
        }
    };

    let before = events.len();
    events.retain(|e| e.age_ms(now_ms) <= retention_ms);
    if events.len() != before {
        debug!("Dropped {} expired events on load", before - events.len());
        if let Err(e) = store.save(&events) {
            debug!("Snapshot compaction failed: {}", e);
        }
    }
    events
}
