use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::event::{EventDraft, SubjectId};
use super::tracker::EventSink;

/// Idle -> Active -> Terminated. No way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    Idle,
    Active,
    Terminated,
}

/// Emits view / heartbeat / final-duration events for one visible subject.
///
/// Bound to the view's visible lifetime: `start` on first visibility, `stop`
/// (or drop) on teardown. A new visibility needs a new tracker.
#[derive(Debug)]
pub struct ViewDurationTracker<K: EventSink + Clone> {
    sink: K,
    subject_id: SubjectId,
    heartbeat_interval: Duration,
    min_final_secs: u64,
    phase: ViewPhase,
    started_at: Option<Instant>,
    cancel: CancellationToken,
}

impl<K: EventSink + Clone> ViewDurationTracker<K> {
    pub fn new(
        sink: K,
        subject_id: SubjectId,
        heartbeat_interval: Duration,
        min_final_secs: u64,
    ) -> Self {
        Self {
            sink,
            subject_id,
            heartbeat_interval,
            min_final_secs,
            phase: ViewPhase::Idle,
            started_at: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    /// Records the initial view and arms the heartbeat. Only valid from Idle.
    pub fn start(&mut self) {
        if self.phase != ViewPhase::Idle {
            return;
        }
        let started = Instant::now();
        self.started_at = Some(started);
        self.phase = ViewPhase::Active;
        self.sink.record(EventDraft::view(self.subject_id));

        tokio::spawn(heartbeat(
            self.sink.clone(),
            self.subject_id,
            started,
            self.heartbeat_interval,
            self.cancel.child_token(),
        ));
    }

    /// Teardown. Returns the whole seconds viewed if a final event was emitted to the sink.
    ///
    /// `Some` does not mean the final is queued: the sink may still throttle it as a
    /// repeat view of the same subject.
    pub fn stop(&mut self) -> Option<u64> {
        let was_active = self.phase == ViewPhase::Active;
        self.phase = ViewPhase::Terminated;
        self.cancel.cancel();
        if !was_active {
            return None;
        }

        let elapsed = self.started_at?.elapsed().as_secs();
        if elapsed < self.min_final_secs {
            return None;
        }
        self.sink.record(
            EventDraft::view(self.subject_id)
                .duration(elapsed)
                .meta("final", true),
        );
        Some(elapsed)
    }
}

impl<K: EventSink + Clone> Drop for ViewDurationTracker<K> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ticks are only a hint; emission is gated on real time since the last one.
async fn heartbeat<K: EventSink>(
    sink: K,
    subject_id: SubjectId,
    started: Instant,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_emit = started;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let now = Instant::now();
                if now.duration_since(last_emit) < period {
                    continue;
                }
                last_emit = now;
                let elapsed = now.duration_since(started).as_secs();
                sink.record(EventDraft::view(subject_id).duration(elapsed));
            }
        }
    }
}
