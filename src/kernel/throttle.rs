use std::collections::HashMap;

use super::event::{ActionType, EventDraft, SubjectId};

/// Last admitted `view` per subject. Admission state only, never persisted.
#[derive(Debug, Default)]
pub struct ViewThrottle {
    window_ms: u64,
    last_view: HashMap<SubjectId, u64>,
}

impl ViewThrottle {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last_view: HashMap::new(),
        }
    }

    /// Returns false when the draft must be dropped.
    /// Only subject-bound views are throttled; everything else passes untouched.
    pub fn admit(&mut self, draft: &EventDraft, now_ms: u64) -> bool {
        let subject = match (draft.action_type, draft.subject_id) {
            (ActionType::View, Some(subject)) => subject,
            _ => return true,
        };

        if let Some(&last) = self.last_view.get(&subject) {
            if now_ms.saturating_sub(last) < self.window_ms {
                return false;
            }
        }
        // Entries past the window no longer gate anything
        let window = self.window_ms;
        self.last_view.retain(|_, last| now_ms.saturating_sub(*last) < window);
        self.last_view.insert(subject, now_ms);
        true
    }

    pub fn tracked_subjects(&self) -> usize {
        self.last_view.len()
    }
}
