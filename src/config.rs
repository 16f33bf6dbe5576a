use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tracker tuning. All durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub throttle_window_ms: u64,
    pub batch_interval_ms: u64,
    pub max_batch_size: usize,
    /// How many events of a failed batch get another chance.
    pub retry_tail: usize,
    pub retention_ms: u64,
    pub gc_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub min_final_duration_secs: u64,
    pub endpoint: String,
    pub session_endpoint: String,
    pub request_timeout_ms: u64,
    pub store_dir: PathBuf,
    pub store_key: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            throttle_window_ms: 15_000,
            batch_interval_ms: 30_000,
            max_batch_size: 10,
            retry_tail: 50,
            retention_ms: 24 * 60 * 60 * 1000,
            gc_interval_ms: 60 * 60 * 1000,
            heartbeat_interval_ms: 30_000,
            min_final_duration_secs: 10,
            endpoint: "http://localhost:3000/api/behavior".to_string(),
            session_endpoint: "http://localhost:3000/api/auth/session".to_string(),
            request_timeout_ms: 5_000,
            store_dir: PathBuf::from(".beacon"),
            store_key: "behavior_queue".to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str::<Self>(&content)?.normalized())
    }

    /// Defaults overridden by `BEACON_*` variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `BEACON_*` overrides from any lookup. Bad values are skipped with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn num<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            slot: &mut T,
        ) {
            if let Some(raw) = lookup(key) {
                match raw.trim().parse() {
                    Ok(v) => *slot = v,
                    Err(_) => warn!("Ignoring {}={:?}: not a number", key, raw),
                }
            }
        }

        num(&lookup, "BEACON_THROTTLE_WINDOW_MS", &mut self.throttle_window_ms);
        num(&lookup, "BEACON_BATCH_INTERVAL_MS", &mut self.batch_interval_ms);
        num(&lookup, "BEACON_MAX_BATCH_SIZE", &mut self.max_batch_size);
        num(&lookup, "BEACON_RETRY_TAIL", &mut self.retry_tail);
        num(&lookup, "BEACON_RETENTION_MS", &mut self.retention_ms);
        num(&lookup, "BEACON_GC_INTERVAL_MS", &mut self.gc_interval_ms);
        num(&lookup, "BEACON_HEARTBEAT_INTERVAL_MS", &mut self.heartbeat_interval_ms);
        num(&lookup, "BEACON_MIN_FINAL_DURATION_SECS", &mut self.min_final_duration_secs);
        num(&lookup, "BEACON_REQUEST_TIMEOUT_MS", &mut self.request_timeout_ms);

        if let Some(v) = lookup("BEACON_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("BEACON_SESSION_ENDPOINT") {
            self.session_endpoint = v;
        }
        if let Some(v) = lookup("BEACON_STORE_DIR") {
            self.store_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("BEACON_STORE_KEY") {
            self.store_key = v;
        }
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        self.max_batch_size = self.max_batch_size.max(1);
        self.retry_tail = self.retry_tail.max(1);
        self
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_constants() {
        let c = TrackerConfig::default();
        assert_eq!(c.throttle_window_ms, 15_000);
        assert_eq!(c.batch_interval_ms, 30_000);
        assert_eq!(c.max_batch_size, 10);
        assert_eq!(c.retry_tail, 50);
        assert_eq!(c.retention_ms, 86_400_000);
        assert_eq!(c.gc_interval_ms, 3_600_000);
    }

    #[test]
    fn overrides_apply_and_bad_values_are_skipped() {
        let env: HashMap<&str, &str> = [
            ("BEACON_MAX_BATCH_SIZE", "25"),
            ("BEACON_BATCH_INTERVAL_MS", "soon"),
            ("BEACON_ENDPOINT", "https://collector.test/ingest"),
        ]
        .into_iter()
        .collect();

        let c = TrackerConfig::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.max_batch_size, 25);
        assert_eq!(c.batch_interval_ms, 30_000);
        assert_eq!(c.endpoint, "https://collector.test/ingest");
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let c = TrackerConfig::default().with_overrides(|k| {
            (k == "BEACON_MAX_BATCH_SIZE").then(|| "0".to_string())
        });
        assert_eq!(c.max_batch_size, 1);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c: TrackerConfig = serde_json::from_str(r#"{ "retry_tail": 5 }"#).unwrap();
        assert_eq!(c.retry_tail, 5);
        assert_eq!(c.max_batch_size, 10);
    }
}
