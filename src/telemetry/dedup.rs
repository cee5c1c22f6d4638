//! # Error Dedup Module
//!
//! Collapses bursts of repeated producer errors into one diagnostic
//! line per unique error per interval.
//!
//! A sensor stuck in a failure loop reports the same error hundreds of
//! times per interval; the log gets one line carrying the first
//! occurrence's timestamp and the repeat count.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::queue::Queue;
use crate::syslog::SystemLog;
use crate::telemetry::ErrorRecord;

/// Periodic task draining the error queue into deduplicated log lines.
pub struct ErrorReporter {
    queue: Arc<Queue<ErrorRecord>>,
    syslog: SystemLog,
    interval: Duration,
}

impl ErrorReporter {
    #[must_use]
    pub fn new(queue: Arc<Queue<ErrorRecord>>, syslog: SystemLog, interval: Duration) -> Self {
        Self {
            queue,
            syslog,
            interval,
        }
    }

    /// Runs the reporting loop until the task is dropped at shutdown.
    pub async fn run(self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Error reporter started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.report_cycle();
        }
    }

    /// One dedup pass over everything queued this interval.
    ///
    /// The dedup key is `(source, message)`; timestamps do not split
    /// keys. Lines come out in first-seen order and carry the first
    /// record's timestamp.
    pub fn report_cycle(&self) {
        let records = self.queue.drain();
        if records.is_empty() {
            return;
        }

        let mut order: Vec<(String, String)> = Vec::new();
        let mut seen: HashMap<(String, String), (i64, u64)> = HashMap::new();
        for record in records {
            let key = (record.source, record.message);
            match seen.get_mut(&key) {
                Some((_, count)) => *count += 1,
                None => {
                    seen.insert(key.clone(), (record.timestamp_ms, 1));
                    order.push(key);
                }
            }
        }

        for key in order {
            let (timestamp_ms, count) = seen[&key];
            let line = if count > 1 {
                format!("ERR [{}] {} (t={timestamp_ms}, x{count})", key.0, key.1)
            } else {
                format!("ERR [{}] {} (t={timestamp_ms})", key.0, key.1)
            };
            self.syslog.log(&line);
        }
    }
}
