pub mod config;
pub mod kernel;
pub mod services;
pub mod store;

// Re-export the producer-facing surface
pub use config::TrackerConfig;
pub use kernel::event::{ActionType, BehaviorEvent, EventDraft};
pub use kernel::tracker::{EventSink, Tracker};
pub use kernel::view::ViewDurationTracker;
