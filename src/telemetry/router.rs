//! # Ingestion Router Module
//!
//! Fire-and-forget entry point for telemetry producers.
//!
//! This module handles:
//! - Non-blocking acceptance of samples and error reports
//! - Drop-on-full backpressure with per-queue counters
//!
//! Producer loops must never stall because persistence is backed up,
//! so both report paths are synchronous `try_put` calls and a full
//! queue silently discards the report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::queue::Queue;
use crate::telemetry::{ErrorRecord, TelemetryRecord};

/// Ingestion statistics for the health surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterStats {
    /// Samples queued and awaiting drain
    pub samples_pending: usize,
    /// Error reports queued and awaiting dedup
    pub errors_pending: usize,
    /// Samples discarded because the raw queue was full
    pub samples_dropped: u64,
    /// Error reports discarded because the error queue was full
    pub errors_dropped: u64,
}

/// Accepts reports from producer tasks and feeds the drain pipeline.
///
/// Shared as an `Arc` across producers; both report methods take
/// `&self` and return nothing, so callers cannot observe (or be
/// stalled by) persistence state.
#[derive(Debug)]
pub struct TelemetryRouter {
    samples: Arc<Queue<TelemetryRecord>>,
    errors: Arc<Queue<ErrorRecord>>,
    samples_dropped: AtomicU64,
    errors_dropped: AtomicU64,
}

impl TelemetryRouter {
    /// Creates a router with bounded queues of the given capacities
    /// (0 = unbounded).
    #[must_use]
    pub fn new(sample_capacity: usize, error_capacity: usize) -> Self {
        Self {
            samples: Arc::new(Queue::new(sample_capacity)),
            errors: Arc::new(Queue::new(error_capacity)),
            samples_dropped: AtomicU64::new(0),
            errors_dropped: AtomicU64::new(0),
        }
    }

    /// Reports one sample.
    ///
    /// The timestamp hint is accepted for API symmetry but records are
    /// stamped at drain time, so it carries no weight today.
    ///
    /// Never blocks: on a full queue the sample is dropped and counted.
    pub fn report_data(&self, source: &str, _timestamp_hint_ms: i64, value: Value) {
        let record = TelemetryRecord {
            source: source.to_string(),
            value,
        };
        if self.samples.try_put(record).is_err() {
            self.samples_dropped.fetch_add(1, Ordering::Relaxed);
            trace!(source, "Sample queue full, dropping");
        }
    }

    /// Reports one error event. Same drop-on-full policy as
    /// [`TelemetryRouter::report_data`].
    pub fn report_error(&self, source: &str, timestamp_ms: i64, message: &str) {
        let record = ErrorRecord {
            source: source.to_string(),
            timestamp_ms,
            message: message.to_string(),
        };
        if self.errors.try_put(record).is_err() {
            self.errors_dropped.fetch_add(1, Ordering::Relaxed);
            trace!(source, "Error queue full, dropping");
        }
    }

    /// Raw sample queue, consumed by the drain task.
    #[must_use]
    pub fn sample_queue(&self) -> Arc<Queue<TelemetryRecord>> {
        Arc::clone(&self.samples)
    }

    /// Error queue, consumed by the dedup reporter.
    #[must_use]
    pub fn error_queue(&self) -> Arc<Queue<ErrorRecord>> {
        Arc::clone(&self.errors)
    }

    /// Current queue depths and drop counters.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            samples_pending: self.samples.len(),
            errors_pending: self.errors.len(),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            errors_dropped: self.errors_dropped.load(Ordering::Relaxed),
        }
    }
}
