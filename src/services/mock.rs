use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::info;

use super::session::SessionCheck;
use super::transport::{DeliveryError, Transport};
use crate::kernel::event::BehaviorEvent;

/// In-process collector. Keeps accepted batches and counts every call.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    batches: Arc<Mutex<Vec<Vec<BehaviorEvent>>>>,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<BehaviorEvent>> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Events from accepted batches only.
    pub fn delivered(&self) -> Vec<BehaviorEvent> {
        self.batches().into_iter().flatten().collect()
    }
}

impl Transport for MockTransport {
    async fn deliver(&self, batch: &[BehaviorEvent]) -> Result<(), DeliveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Unavailable("mock collector offline".to_string()));
        }
        info!("[MOCK] Collected batch of {}", batch.len());
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(batch.to_vec());
        }
        Ok(())
    }
}

/// Session flag that can be flipped from outside.
#[derive(Debug, Clone)]
pub struct StaticSession {
    active: Arc<AtomicBool>,
}

impl StaticSession {
    pub fn new(active: bool) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(active)),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl SessionCheck for StaticSession {
    async fn has_session(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
