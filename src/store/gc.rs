use tracing::debug;

use super::SnapshotStore;

/// Purges expired entries from the *persisted* snapshot.
///
/// Works on the store directly rather than the live queue, so it also cleans
/// up after earlier process instances. Rewrites only when something was removed.
/// Returns the number of purged entries.
pub fn collect_garbage(store: &dyn SnapshotStore, now_ms: u64, retention_ms: u64) -> usize {
    let mut events = match store.load() {
        Ok(events) => events,
        Err(e) => {
            debug!("GC skipped, snapshot unreadable: {}", e);
            return 0;
        }
    };

    let before = events.len();
    events.retain(|e| e.age_ms(now_ms) <= retention_ms);
    let purged = before - events.len();
    if purged == 0 {
        return 0;
    }

    if let Err(e) = store.save(&events) {
        debug!("GC rewrite failed: {}", e);
        return 0;
    }
    debug!("GC purged {} expired events", purged);
    purged
}
