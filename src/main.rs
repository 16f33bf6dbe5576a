use std::collections::HashMap;

use beacon::kernel::event::{ActionType, EventDraft};
use beacon::services::mock::{MockTransport, StaticSession};
use beacon::services::session::HttpSessionCheck;
use beacon::services::transport::HttpTransport;
use beacon::store::FileSnapshotStore;
use beacon::{Tracker, TrackerConfig, ViewDurationTracker};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 2. Config: optional JSON file, then BEACON_* overrides
    let args: Vec<String> = std::env::args().skip(1).collect();
    let offline = args.iter().any(|a| a == "--offline");
    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => TrackerConfig::from_json_file(path)?
            .with_overrides(|key| std::env::var(key).ok()),
        None => TrackerConfig::from_env(),
    };
    tracing::info!("Beacon starting. Endpoint: {} (offline: {})", config.endpoint, offline);

    // 3. Tracker
    let store = FileSnapshotStore::new(&config.store_dir, &config.store_key);
    let tracker = if offline {
        Tracker::spawn(&config, store, MockTransport::new(), StaticSession::new(true))
    } else {
        Tracker::spawn(
            &config,
            store,
            HttpTransport::new(config.endpoint.clone(), config.request_timeout()),
            HttpSessionCheck::new(config.session_endpoint.clone(), config.request_timeout()),
        )
    };

    // 4. Console producer
    println!("Actions: view|vote|comment|click|share|save [id], open <id>, close <id>, flush, stats, queue, quit");
    let mut open_views: HashMap<i64, ViewDurationTracker<Tracker>> = HashMap::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else { continue };
        let subject = parts.next().and_then(|s| s.parse::<i64>().ok());

        match (cmd, subject) {
            ("quit", _) => break,
            ("flush", _) => tracker.flush(),
            ("stats", _) => {
                let stats = tracker.stats().await;
                println!("{:#?}\nDelivery ratio: {:.2}", stats, stats.delivery_ratio());
            }
            ("queue", _) => {
                for event in tracker.snapshot().await {
                    println!("{}", serde_json::to_string(&event)?);
                }
            }
            ("open", Some(id)) => {
                open_views.entry(id).or_insert_with(|| tracker.track_view(id));
            }
            ("close", Some(id)) => match open_views.remove(&id).map(|mut v| v.stop()) {
                Some(Some(secs)) => println!("Reported {}s for {}", secs, id),
                Some(None) => println!("Viewed {} too briefly to report", id),
                None => println!("{} is not open", id),
            },
            (action, subject) => match ActionType::parse(action) {
                Some(action) => {
                    let mut draft = EventDraft::new(action);
                    draft.subject_id = subject;
                    tracker.record(draft);
                }
                None => println!("Unknown action '{}'", action),
            },
        }
    }

    // Teardown: final durations, a last delivery attempt, then persist
    for (_, mut view) in open_views.drain() {
        view.stop();
    }
    tracker.flush();
    tracker.shutdown().await;
    tracing::info!("Beacon stopped.");
    Ok(())
}
