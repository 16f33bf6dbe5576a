use std::collections::VecDeque;

use super::event::BehaviorEvent;

/// The in-memory event queue, front = next to deliver.
///
/// Priority events go to the absolute head, so a burst of them ends up
/// newest-first. They still precede every standard event queued at the time.
#[derive(Debug, Default, Clone)]
pub struct EventQueue {
    buffer: VecDeque<BehaviorEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<BehaviorEvent>) -> Self {
        Self {
            buffer: events.into(),
        }
    }

    pub fn push(&mut self, event: BehaviorEvent) {
        if event.action_type.is_priority() {
            self.buffer.push_front(event);
        } else {
            self.buffer.push_back(event);
        }
    }

    /// Removes up to `max` events from the front.
    pub fn take_batch(&mut self, max: usize) -> Vec<BehaviorEvent> {
        let n = max.min(self.buffer.len());
        self.buffer.drain(..n).collect()
    }

    /// Puts `events` back at the front, keeping their relative order.
    pub fn requeue_front(&mut self, events: Vec<BehaviorEvent>) {
        for event in events.into_iter().rev() {
            self.buffer.push_front(event);
        }
    }

    /// Requeues only the last `keep` events of a failed batch. Returns how many were dropped.
    pub fn requeue_failed(&mut self, mut batch: Vec<BehaviorEvent>, keep: usize) -> usize {
        let dropped = batch.len().saturating_sub(keep);
        let tail = batch.split_off(dropped);
        self.requeue_front(tail);
        dropped
    }

    /// Drops events older than `retention_ms`. Returns how many were removed.
    pub fn prune_expired(&mut self, now_ms: u64, retention_ms: u64) -> usize {
        let before = self.buffer.len();
        self.buffer.retain(|e| e.age_ms(now_ms) <= retention_ms);
        before - self.buffer.len()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Contiguous view for persisting without a copy.
    pub fn as_slice(&mut self) -> &[BehaviorEvent] {
        self.buffer.make_contiguous()
    }

    pub fn to_vec(&self) -> Vec<BehaviorEvent> {
        self.buffer.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BehaviorEvent> {
        self.buffer.iter()
    }
}
