use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Sleep};

/// What `record` should do once the queue is updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Size threshold reached.
    Immediate,
    /// Deferred flush newly armed.
    Armed,
    /// A timer is already pending; nothing to do.
    Pending,
}

/// Owns the single deferred-flush timer.
#[derive(Debug)]
pub struct FlushScheduler {
    batch_interval: Duration,
    max_batch_size: usize,
    timer: Option<Pin<Box<Sleep>>>,
}

impl FlushScheduler {
    pub fn new(batch_interval: Duration, max_batch_size: usize) -> Self {
        Self {
            batch_interval,
            max_batch_size: max_batch_size.max(1),
            timer: None,
        }
    }

    /// Decision after an event was admitted and the queue now holds `queue_len` events.
    pub fn on_record(&mut self, queue_len: usize) -> FlushDecision {
        if queue_len >= self.max_batch_size {
            return FlushDecision::Immediate;
        }
        if self.timer.is_some() {
            return FlushDecision::Pending;
        }
        self.arm();
        FlushDecision::Armed
    }

    pub fn arm(&mut self) {
        self.timer = Some(Box::pin(sleep(self.batch_interval)));
    }

    pub fn cancel(&mut self) {
        self.timer = None;
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Resolves when the armed timer fires, and disarms it. Never resolves while disarmed.
    pub async fn fired(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.as_mut().await;
                self.timer = None;
            }
            None => pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn full_queue_flushes_immediately_without_arming() {
        let mut s = FlushScheduler::new(Duration::from_secs(30), 10);
        assert_eq!(s.on_record(10), FlushDecision::Immediate);
        assert_eq!(s.on_record(11), FlushDecision::Immediate);
        assert!(!s.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn only_first_record_arms_the_timer() {
        let mut s = FlushScheduler::new(Duration::from_secs(30), 10);
        assert_eq!(s.on_record(1), FlushDecision::Armed);
        assert!(s.is_armed());

        advance(Duration::from_secs(20)).await;
        assert_eq!(s.on_record(2), FlushDecision::Pending);

        // Deadline still counts from the first record
        advance(Duration::from_secs(10)).await;
        timeout(Duration::from_millis(1), s.fired())
            .await
            .expect("timer armed at t=0 fires at t=30s");
        assert!(!s.is_armed());
        assert_eq!(s.on_record(1), FlushDecision::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_disarms() {
        let mut s = FlushScheduler::new(Duration::from_secs(30), 0);
        assert_eq!(s.max_batch_size(), 1);
        s.arm();
        assert!(s.is_armed());
        s.cancel();
        assert!(!s.is_armed());
        assert!(timeout(Duration::from_secs(60), s.fired()).await.is_err());
    }
}
