//! # Aggregation Module
//!
//! Compacts per-cycle telemetry snapshots into one human-readable
//! summary line per interval.
//!
//! This module handles:
//! - Draining the aggregation queue and merging snapshots key-by-key
//! - Formatting the merged view as a `DATA | ...` diagnostic line
//!
//! Merging is last-write-wins across cycles within the interval, so a
//! summary shows the freshest value per source, not an average.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::queue::Queue;
use crate::syslog::SystemLog;
use crate::telemetry::TelemetrySnapshot;

/// Periodic task turning drained snapshots into summary log lines.
pub struct Compactor {
    queue: Arc<Queue<TelemetrySnapshot>>,
    syslog: SystemLog,
    interval: Duration,
}

impl Compactor {
    #[must_use]
    pub fn new(queue: Arc<Queue<TelemetrySnapshot>>, syslog: SystemLog, interval: Duration) -> Self {
        Self {
            queue,
            syslog,
            interval,
        }
    }

    /// Runs the compaction loop until the task is dropped at shutdown.
    pub async fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Aggregation compactor started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.compact_cycle();
        }
    }

    /// One compaction pass. Emits nothing when the interval
    /// accumulated no snapshots.
    pub fn compact_cycle(&self) {
        let snapshots = self.queue.drain();
        if snapshots.is_empty() {
            return;
        }

        let mut merged = TelemetrySnapshot::new();
        for snapshot in snapshots {
            merged.merge(snapshot);
        }
        self.syslog.log(&format_summary(&merged));
    }
}

/// Formats a merged snapshot as `DATA | <entry> | <entry> | ...`.
fn format_summary(snapshot: &TelemetrySnapshot) -> String {
    let entries: Vec<String> = snapshot
        .iter()
        .map(|(source, value)| format_entry(source, value))
        .collect();
    format!("DATA | {}", entries.join(" | "))
}

/// One source's entry: objects become `source key=value ...`, anything
/// else `source=value`.
fn format_entry(source: &str, value: &Value) -> String {
    match value {
        Value::Object(_) => format!("{source} {}", format_value(value)),
        _ => format!("{source}={}", format_value(value)),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", joined.join(","))
        }
        Value::Object(map) => map
            .iter()
            .map(|(key, nested)| format!("{key}={}", format_value(nested)))
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}
