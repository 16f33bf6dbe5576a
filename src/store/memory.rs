use std::sync::{Arc, Mutex};

use super::{SnapshotStore, StoreError};

/// Process-local store. Clones share the same bytes, which lets a test
/// drop a tracker and build a new one on top of the "surviving" snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    bytes: Arc<Mutex<Option<Vec<u8>>>>,
    writes: Arc<Mutex<u64>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }

    /// Replaces the stored bytes without counting a write. Used to seed corrupt snapshots.
    pub fn seed_raw(&self, bytes: &[u8]) {
        if let Ok(mut slot) = self.bytes.lock() {
            *slot = Some(bytes.to_vec());
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.bytes.lock().map(|b| b.clone()).unwrap_or(None))
    }

    fn write(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Ok(mut slot) = self.bytes.lock() {
            *slot = Some(bytes.to_vec());
        }
        if let Ok(mut w) = self.writes.lock() {
            *w += 1;
        }
        Ok(())
    }
}
