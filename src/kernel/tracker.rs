use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::event::{BehaviorEvent, EventDraft, SubjectId};
use super::queue::EventQueue;
use super::scheduler::{FlushDecision, FlushScheduler};
use super::stats::TrackerStats;
use super::throttle::ViewThrottle;
use super::time::Clock;
use super::view::ViewDurationTracker;
use crate::config::TrackerConfig;
use crate::services::session::SessionCheck;
use crate::services::transport::{DeliveryError, Transport};
use crate::store::{self, SnapshotStore};

/// Anything producers can hand a draft to. Fire-and-forget.
pub trait EventSink: Send + Sync + 'static {
    fn record(&self, draft: EventDraft);
}

#[derive(Debug)]
enum Command {
    Record(EventDraft),
    Flush,
    Snapshot(oneshot::Sender<Vec<BehaviorEvent>>),
    Stats(oneshot::Sender<TrackerStats>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ViewSettings {
    pub heartbeat_interval: Duration,
    pub min_final_secs: u64,
}

/// Handle to the process-wide tracker.
///
/// Construct one at the application root and pass clones to producers.
/// Every method returns immediately; all queue work happens on the worker task.
#[derive(Debug, Clone)]
pub struct Tracker {
    tx: mpsc::UnboundedSender<Command>,
    view: ViewSettings,
}

impl Tracker {
    /// Loads the persisted queue and starts the worker. Must run inside a tokio runtime.
    pub fn spawn<S, T, I>(config: &TrackerConfig, store: S, transport: T, session: I) -> Self
    where
        S: SnapshotStore,
        T: Transport,
        I: SessionCheck,
    {
        Self::spawn_with_clock(config, store, transport, session, Clock::system())
    }

    pub fn spawn_with_clock<S, T, I>(
        config: &TrackerConfig,
        store: S,
        transport: T,
        session: I,
        clock: Clock,
    ) -> Self
    where
        S: SnapshotStore,
        T: Transport,
        I: SessionCheck,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let recovered = store::load_queue(&store, clock.now_ms(), config.retention_ms);
        if !recovered.is_empty() {
            info!("Recovered {} queued events from snapshot", recovered.len());
        }

        let worker = TrackerWorker {
            commands: rx,
            queue: EventQueue::from_events(recovered),
            throttle: ViewThrottle::new(config.throttle_window_ms),
            scheduler: FlushScheduler::new(config.batch_interval(), config.max_batch_size),
            in_flight: None,
            store,
            transport: Arc::new(transport),
            session: Arc::new(session),
            clock,
            last_stamp: 0,
            retry_tail: config.retry_tail.max(1),
            retention_ms: config.retention_ms,
            gc_interval: config.gc_interval(),
            stats: TrackerStats::default(),
        };
        tokio::spawn(worker.run());

        Self {
            tx,
            view: ViewSettings {
                heartbeat_interval: config.heartbeat_interval(),
                min_final_secs: config.min_final_duration_secs,
            },
        }
    }

    pub fn record(&self, draft: EventDraft) {
        self.send(Command::Record(draft));
    }

    /// Starts a delivery attempt now. Returns before the network call completes.
    pub fn flush(&self) {
        self.send(Command::Flush);
    }

    /// Queue contents, front to back.
    pub async fn snapshot(&self) -> Vec<BehaviorEvent> {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Snapshot(ack));
        rx.await.unwrap_or_default()
    }

    pub async fn stats(&self) -> TrackerStats {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Stats(ack));
        rx.await.unwrap_or_default()
    }

    /// Waits for an in-flight delivery, persists the queue and stops the worker.
    pub async fn shutdown(&self) {
        let (ack, rx) = oneshot::channel();
        self.send(Command::Shutdown(ack));
        let _ = rx.await;
    }

    /// A duration tracker for `subject_id`, already started.
    pub fn track_view(&self, subject_id: SubjectId) -> ViewDurationTracker<Tracker> {
        let mut view = ViewDurationTracker::new(
            self.clone(),
            subject_id,
            self.view.heartbeat_interval,
            self.view.min_final_secs,
        );
        view.start();
        view
    }

    fn send(&self, cmd: Command) {
        if self.tx.send(cmd).is_err() {
            debug!("Tracker worker is gone, dropping command");
        }
    }
}

impl EventSink for Tracker {
    fn record(&self, draft: EventDraft) {
        Tracker::record(self, draft);
    }
}

#[derive(Debug)]
enum FlushOutcome {
    Delivered(usize),
    Failed(Vec<BehaviorEvent>, DeliveryError),
    NoSession(Vec<BehaviorEvent>),
}

/// Sole owner of the queue and throttle state.
///
/// The in-flight flush task doubles as the processing guard: while it exists
/// no second batch is taken, but records keep landing in the queue.
struct TrackerWorker<S, T, I> {
    commands: mpsc::UnboundedReceiver<Command>,
    queue: EventQueue,
    throttle: ViewThrottle,
    scheduler: FlushScheduler,
    in_flight: Option<JoinHandle<FlushOutcome>>,
    store: S,
    transport: Arc<T>,
    session: Arc<I>,
    clock: Clock,
    last_stamp: u64,
    retry_tail: usize,
    retention_ms: u64,
    gc_interval: Duration,
    stats: TrackerStats,
}

impl<S, T, I> TrackerWorker<S, T, I>
where
    S: SnapshotStore,
    T: Transport,
    I: SessionCheck,
{
    async fn run(mut self) {
        info!("Tracker worker started. Queue: {}", self.queue.len());

        let mut gc = interval_at(Instant::now() + self.gc_interval, self.gc_interval);
        gc.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Recovered events get delivered on the normal cadence
        if !self.queue.is_empty() {
            self.scheduler.arm();
        }

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown(ack)) => {
                        self.drain().await;
                        let _ = ack.send(());
                        break;
                    }
                    Some(cmd) => self.handle(cmd),
                    None => {
                        self.drain().await;
                        break;
                    }
                },
                outcome = flush_finished(&mut self.in_flight) => self.complete_flush(outcome),
                _ = self.scheduler.fired() => self.flush_once(),
                _ = gc.tick() => self.collect_garbage(),
            }
        }
        info!("Tracker worker stopped. Queue: {}", self.queue.len());
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Record(draft) => self.record(draft),
            Command::Flush => self.flush_once(),
            Command::Snapshot(ack) => {
                let _ = ack.send(self.queue.to_vec());
            }
            Command::Stats(ack) => {
                let mut stats = self.stats.clone();
                stats.queue_len = self.queue.len();
                let _ = ack.send(stats);
            }
            // Handled in the loop
            Command::Shutdown(_) => {}
        }
    }

    fn record(&mut self, draft: EventDraft) {
        let now = self.stamp_time();
        if !self.throttle.admit(&draft, now) {
            self.stats.throttled += 1;
            return;
        }

        self.queue.push(draft.stamp(now));
        self.stats.recorded += 1;
        self.persist();

        if self.scheduler.on_record(self.queue.len()) == FlushDecision::Immediate {
            self.flush_once();
        }
    }

    /// Takes one batch off the front and hands it to a delivery task.
    fn flush_once(&mut self) {
        if self.in_flight.is_some() || self.queue.is_empty() {
            return;
        }
        self.scheduler.cancel();

        let batch = self.queue.take_batch(self.scheduler.max_batch_size());
        // The remainder must survive a crash while the batch is out
        self.persist();
        self.stats.flush_attempts += 1;
        debug!("Flushing batch of {} ({} left)", batch.len(), self.queue.len());

        let transport = Arc::clone(&self.transport);
        let session = Arc::clone(&self.session);
        self.in_flight = Some(tokio::spawn(async move {
            if !session.has_session().await {
                return FlushOutcome::NoSession(batch);
            }
            let result = transport.deliver(&batch).await;
            match result {
                Ok(()) => FlushOutcome::Delivered(batch.len()),
                Err(e) => FlushOutcome::Failed(batch, e),
            }
        }));
    }

    fn complete_flush(&mut self, outcome: Option<FlushOutcome>) {
        match outcome {
            Some(FlushOutcome::Delivered(n)) => {
                self.stats.delivered_batches += 1;
                self.stats.delivered_events += n as u64;
            }
            Some(FlushOutcome::Failed(batch, e)) => {
                warn!("Batch delivery failed ({} events): {}", batch.len(), e);
                let dropped = self.queue.requeue_failed(batch, self.retry_tail);
                self.stats.failed_batches += 1;
                self.stats.dropped_on_failure += dropped as u64;
                self.persist();
            }
            Some(FlushOutcome::NoSession(batch)) => {
                // Resumes on the next record or explicit flush
                debug!("No session, holding {} events", batch.len());
                self.queue.requeue_front(batch);
                self.stats.session_aborts += 1;
                self.persist();
                return;
            }
            // Task died with its batch; at most one batch is lost
            None => {}
        }

        if !self.queue.is_empty() {
            self.scheduler.arm();
        }
    }

    fn collect_garbage(&mut self) {
        let now = self.clock.now_ms();
        let purged = store::collect_garbage(&self.store, now, self.retention_ms);
        let pruned = self.queue.prune_expired(now, self.retention_ms);
        if pruned > 0 {
            debug!("Pruned {} expired events from the live queue", pruned);
        }
        self.stats.gc_purged += purged as u64;
    }

    async fn drain(&mut self) {
        self.scheduler.cancel();
        if let Some(handle) = self.in_flight.take() {
            let outcome = match handle.await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!("Flush task failed: {}", e);
                    None
                }
            };
            self.complete_flush(outcome);
            self.scheduler.cancel();
        }
        self.persist();
    }

    /// Write-through. Failures are logged and swallowed.
    fn persist(&mut self) {
        if let Err(e) = self.store.save(self.queue.as_slice()) {
            debug!("Queue persist failed: {}", e);
            self.stats.persist_failures += 1;
        }
    }

    /// Never earlier than the previous stamp.
    fn stamp_time(&mut self) -> u64 {
        let now = self.clock.now_ms().max(self.last_stamp);
        self.last_stamp = now;
        now
    }
}

async fn flush_finished(in_flight: &mut Option<JoinHandle<FlushOutcome>>) -> Option<FlushOutcome> {
    let result = match in_flight.as_mut() {
        Some(handle) => handle.await,
        None => return pending().await,
    };
    *in_flight = None;
    match result {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!("Flush task failed: {}", e);
            None
        }
    }
}
