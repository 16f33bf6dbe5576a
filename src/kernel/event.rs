use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Semantic category of a behavioral signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    View,
    Vote,
    Comment,
    Click,
    Share,
    Save,
}

impl ActionType {
    /// Priority events jump to the head of the queue.
    pub fn is_priority(self) -> bool {
        matches!(
            self,
            ActionType::Vote | ActionType::Comment | ActionType::Share | ActionType::Save
        )
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" => Some(ActionType::View),
            "vote" => Some(ActionType::Vote),
            "comment" => Some(ActionType::Comment),
            "click" => Some(ActionType::Click),
            "share" => Some(ActionType::Share),
            "save" => Some(ActionType::Save),
            _ => None,
        }
    }
}

pub type SubjectId = i64;

/// A recorded signal, as queued, persisted and delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorEvent {
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<SubjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    /// Epoch milliseconds, assigned at enqueue.
    pub timestamp: u64,
    /// Debugging / de-dup only. Never used for ordering.
    pub id: String,
}

impl BehaviorEvent {
    pub fn is_final(&self) -> bool {
        self.metadata.get("final").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp)
    }
}

/// The partial event producers hand to `record`. Timestamp and id are stamped by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub action_type: ActionType,
    pub subject_id: Option<SubjectId>,
    pub duration_seconds: Option<u64>,
    pub metadata: Map<String, Value>,
}

impl EventDraft {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            subject_id: None,
            duration_seconds: None,
            metadata: Map::new(),
        }
    }

    pub fn view(subject_id: SubjectId) -> Self {
        Self::new(ActionType::View).subject(subject_id)
    }

    pub fn subject(mut self, subject_id: SubjectId) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    pub fn duration(mut self, seconds: u64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Stamps the draft into a full event.
    pub fn stamp(self, timestamp: u64) -> BehaviorEvent {
        BehaviorEvent {
            action_type: self.action_type,
            subject_id: self.subject_id,
            duration_seconds: self.duration_seconds,
            metadata: self.metadata,
            timestamp,
            id: event_id(timestamp),
        }
    }
}

/// `<timestamp>-<random suffix>`
pub fn event_id(timestamp: u64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", timestamp, &suffix[..9])
}
