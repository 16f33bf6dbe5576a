use serde::Serialize;

/// Counters kept by the tracker worker.
///
/// Read-only. Nothing in the flush or admission path branches on these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub recorded: u64,
    pub throttled: u64,
    pub flush_attempts: u64,
    pub delivered_batches: u64,
    pub delivered_events: u64,
    pub failed_batches: u64,
    /// Events cut from failed batches beyond the retry tail.
    pub dropped_on_failure: u64,
    pub session_aborts: u64,
    pub gc_purged: u64,
    pub persist_failures: u64,
    pub queue_len: usize,
}

impl TrackerStats {
    pub fn delivery_ratio(&self) -> f64 {
        let settled = self.delivered_batches + self.failed_batches;
        if settled == 0 {
            return 0.0;
        }
        self.delivered_batches as f64 / settled as f64
    }
}
