//! # Sample Drain Module
//!
//! Periodic task that empties the raw sample queue into the telemetry
//! segment store.
//!
//! This module handles:
//! - Draining the raw queue on a fixed interval
//! - Drain-time timestamping and JSONL serialization
//! - The one-time rename of the active segment once the clock syncs
//! - Handing per-cycle snapshots to the aggregation stage
//!
//! Records are stamped when they are pulled, not when they were
//! reported, so a persisted timestamp includes queue dwell time.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Datelike;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::clock::{format_file_stamp, format_record_stamp, TimeAuthority, MIN_VALID_YEAR};
use crate::queue::Queue;
use crate::storage::SegmentStore;
use crate::telemetry::{TelemetryRecord, TelemetrySnapshot};

/// Persisted shape of one sample line. Field order is the wire order.
#[derive(Serialize)]
struct SampleLine<'a> {
    t: String,
    n: &'a str,
    v: &'a Value,
}

/// Drains raw samples into JSONL segments.
///
/// The drain task is the only appender of the telemetry store; the
/// mutex exists for the HTTP layer's read-back and clear calls.
pub struct SampleDrain {
    queue: Arc<Queue<TelemetryRecord>>,
    aggregate_queue: Arc<Queue<TelemetrySnapshot>>,
    store: Arc<Mutex<SegmentStore>>,
    clock: Arc<dyn TimeAuthority>,
    interval: Duration,
    /// Set once the active segment carries a timestamp name
    renamed: bool,
    write_failures: u64,
    snapshots_dropped: u64,
}

impl SampleDrain {
    #[must_use]
    pub fn new(
        queue: Arc<Queue<TelemetryRecord>>,
        aggregate_queue: Arc<Queue<TelemetrySnapshot>>,
        store: Arc<Mutex<SegmentStore>>,
        clock: Arc<dyn TimeAuthority>,
        interval: Duration,
    ) -> Self {
        Self {
            queue,
            aggregate_queue,
            store,
            clock,
            interval,
            renamed: false,
            write_failures: 0,
            snapshots_dropped: 0,
        }
    }

    /// Runs the drain loop until the task is dropped at shutdown.
    pub async fn run(mut self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Sample drain started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.drain_cycle();
        }
    }

    /// One drain pass: empty the queue, persist every record, hand the
    /// per-cycle snapshot to the aggregation stage.
    ///
    /// A failed write drops that record and continues; one bad record
    /// never aborts the rest of the cycle.
    pub fn drain_cycle(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        self.maybe_rename();

        let mut snapshot = TelemetrySnapshot::new();
        while let Ok(record) = self.queue.try_get() {
            let line = SampleLine {
                t: format_record_stamp(&self.clock.now()),
                n: &record.source,
                v: &record.value,
            };
            match serde_json::to_vec(&line) {
                Ok(mut payload) => {
                    payload.push(b'\n');
                    let result = self
                        .store
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .append(&payload);
                    if let Err(err) = result {
                        self.write_failures += 1;
                        warn!(
                            source = %record.source,
                            error = %err,
                            "Failed to persist sample, dropping record"
                        );
                    }
                }
                Err(err) => {
                    self.write_failures += 1;
                    warn!(
                        source = %record.source,
                        error = %err,
                        "Failed to serialize sample, dropping record"
                    );
                }
            }
            snapshot.insert(&record.source, record.value);
        }

        if !snapshot.is_empty() && self.aggregate_queue.try_put(snapshot).is_err() {
            self.snapshots_dropped += 1;
            warn!("Aggregation queue full, dropping cycle snapshot");
        }
    }

    /// Renames the active segment to a timestamp stem the first time
    /// the clock is trustworthy. Fires at most once per process; a
    /// failed rename is retried on the next cycle.
    fn maybe_rename(&mut self) {
        if self.renamed || !self.clock.is_synced() {
            return;
        }
        let now = self.clock.now();
        if now.year() < MIN_VALID_YEAR {
            return;
        }

        let stem = format_file_stamp(&now);
        let result = self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rename_active(&stem);
        match result {
            Ok(()) => self.renamed = true,
            Err(err) => warn!(error = %err, "Segment rename failed, retrying next cycle"),
        }
    }

    /// Records dropped due to serialization or write errors.
    #[must_use]
    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    /// Cycle snapshots dropped because the aggregation queue was full.
    #[must_use]
    pub fn snapshots_dropped(&self) -> u64 {
        self.snapshots_dropped
    }
}
