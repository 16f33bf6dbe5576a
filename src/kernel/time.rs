use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Wall-clock milliseconds derived from a monotonic source.
///
/// The wall time is sampled once at construction; every later reading is
/// `anchor + elapsed` on the tokio clock, so readings never go backwards and
/// paused-time tests move it together with the timers.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    anchor_ms: u64,
    origin: Instant,
}

impl Clock {
    pub fn system() -> Self {
        let anchor_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::starting_at(anchor_ms)
    }

    pub fn starting_at(anchor_ms: u64) -> Self {
        Self {
            anchor_ms,
            origin: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.anchor_ms + self.origin.elapsed().as_millis() as u64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}
