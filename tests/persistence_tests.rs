use std::time::Duration;

use beacon::kernel::event::{ActionType, BehaviorEvent, EventDraft};
use beacon::kernel::time::Clock;
use beacon::services::mock::{MockTransport, StaticSession};
use beacon::store::{
    collect_garbage, load_queue, FileSnapshotStore, MemorySnapshotStore, SnapshotStore,
};
use beacon::{Tracker, TrackerConfig};
use tokio::time::sleep;

const HOUR_MS: u64 = 60 * 60 * 1000;
const DAY_MS: u64 = 24 * HOUR_MS;
const NOW: u64 = 1_700_000_000_000;

fn event_aged(subject: i64, age_ms: u64) -> BehaviorEvent {
    EventDraft::new(ActionType::Click)
        .subject(subject)
        .stamp(NOW - age_ms)
}

#[test]
fn test_gc_purges_only_expired_entries() {
    let store = MemorySnapshotStore::new();
    store
        .save(&[event_aged(1, 25 * HOUR_MS), event_aged(2, HOUR_MS)])
        .unwrap();

    let purged = collect_garbage(&store, NOW, DAY_MS);
    assert_eq!(purged, 1);

    let left = store.load().unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].subject_id, Some(2));
}

#[test]
fn test_gc_does_not_rewrite_when_nothing_expired() {
    let store = MemorySnapshotStore::new();
    store.save(&[event_aged(1, HOUR_MS)]).unwrap();
    let writes = store.write_count();

    assert_eq!(collect_garbage(&store, NOW, DAY_MS), 0);
    assert_eq!(store.write_count(), writes);
}

#[test]
fn test_gc_tolerates_missing_and_corrupt_snapshots() {
    let store = MemorySnapshotStore::new();
    assert_eq!(collect_garbage(&store, NOW, DAY_MS), 0);

    store.seed_raw(b"{ not json");
    assert_eq!(collect_garbage(&store, NOW, DAY_MS), 0);
    assert_eq!(store.write_count(), 0);
}

#[test]
fn test_load_drops_expired_and_compacts_once() {
    let store = MemorySnapshotStore::new();
    store
        .save(&[event_aged(1, 30 * HOUR_MS), event_aged(2, 10), event_aged(3, 26 * HOUR_MS)])
        .unwrap();
    let writes = store.write_count();

    let events = load_queue(&store, NOW, DAY_MS);
    assert_eq!(events.len(), 1);
    assert_eq!(store.write_count(), writes + 1);
    assert_eq!(store.load().unwrap().len(), 1);

    // Already compact: no write
    load_queue(&store, NOW, DAY_MS);
    assert_eq!(store.write_count(), writes + 1);
}

#[test]
fn test_load_corrupt_snapshot_is_empty_queue() {
    let store = MemorySnapshotStore::new();
    store.seed_raw(b"[{\"actionType\": \"teleport\"}]");
    assert!(load_queue(&store, NOW, DAY_MS).is_empty());
}

#[test]
fn test_file_store_round_trip_and_gc() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path().join("nested"), "behavior_queue");
    assert!(store.load().unwrap().is_empty(), "Absent file reads as empty");

    let fresh = event_aged(2, HOUR_MS);
    let with_meta = BehaviorEvent {
        duration_seconds: Some(42),
        ..EventDraft::view(9).meta("final", true).stamp(NOW)
    };
    store
        .save(&[event_aged(1, 25 * HOUR_MS), fresh.clone(), with_meta.clone()])
        .unwrap();
    assert!(store.path().exists());

    assert_eq!(collect_garbage(&store, NOW, DAY_MS), 1);
    let left = store.load().unwrap();
    assert_eq!(left, vec![fresh, with_meta.clone()]);
    assert!(left[1].is_final());
}

#[test]
fn test_snapshot_wire_shape() {
    let event = EventDraft::view(3).duration(31).stamp(NOW);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["actionType"], "view");
    assert_eq!(json["subjectId"], 3);
    assert_eq!(json["durationSeconds"], 31);
    assert_eq!(json["timestamp"], NOW);
    assert!(json.get("metadata").is_none());

    let account_level = EventDraft::new(ActionType::Share).stamp(NOW);
    let json = serde_json::to_value(&account_level).unwrap();
    assert!(json.get("subjectId").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_queue_survives_restart() {
    let store = MemorySnapshotStore::new();
    let config = TrackerConfig::default();

    let first = Tracker::spawn_with_clock(
        &config,
        store.clone(),
        MockTransport::new(),
        StaticSession::new(false),
        Clock::starting_at(NOW),
    );
    first.record(EventDraft::new(ActionType::Click).subject(1));
    first.record(EventDraft::new(ActionType::Vote).subject(2));
    first.record(EventDraft::view(3));
    let queued = first.snapshot().await;
    first.shutdown().await;

    let transport = MockTransport::new();
    let second = Tracker::spawn_with_clock(
        &config,
        store.clone(),
        transport.clone(),
        StaticSession::new(true),
        Clock::starting_at(NOW + 5_000),
    );
    assert_eq!(second.snapshot().await, queued);

    // Recovered events go out on the normal cadence
    sleep(Duration::from_millis(30_500)).await;
    assert_eq!(transport.delivered(), queued);
    assert!(store.load().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_restart_drops_events_past_retention() {
    let store = MemorySnapshotStore::new();
    store
        .save(&[event_aged(1, 25 * HOUR_MS), event_aged(2, HOUR_MS)])
        .unwrap();

    let tracker = Tracker::spawn_with_clock(
        &TrackerConfig::default(),
        store.clone(),
        MockTransport::new(),
        StaticSession::new(false),
        Clock::starting_at(NOW),
    );
    let queue = tracker.snapshot().await;
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].subject_id, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_periodic_gc_runs_without_flush_activity() {
    // Kept at load, expired by the first hourly pass
    let store = MemorySnapshotStore::new();
    store.save(&[event_aged(1, 23 * HOUR_MS + 30 * 60 * 1000)]).unwrap();

    let tracker = Tracker::spawn_with_clock(
        &TrackerConfig::default(),
        store.clone(),
        MockTransport::new(),
        StaticSession::new(false),
        Clock::starting_at(NOW),
    );
    assert_eq!(tracker.snapshot().await.len(), 1);

    sleep(Duration::from_millis(HOUR_MS + 1_000)).await;
    assert!(store.load().unwrap().is_empty());
    assert!(tracker.snapshot().await.is_empty());
    assert_eq!(tracker.stats().await.gc_purged, 1);
}
