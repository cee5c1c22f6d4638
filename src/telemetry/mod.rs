//! # Telemetry Module
//!
//! Ingestion pipeline for structured sensor samples.
//!
//! This module handles:
//! - Record types shared between producers and drain tasks
//! - The ingestion router producers report through
//! - Periodic drain of raw samples into JSONL segments
//! - Interval aggregation and error burst deduplication
//!
//! Producers never block and never see storage errors: everything past
//! the router is decoupled through bounded queues.

pub mod aggregate;
pub mod dedup;
pub mod drain;
pub mod router;

pub use aggregate::Compactor;
pub use dedup::ErrorReporter;
pub use drain::SampleDrain;
pub use router::TelemetryRouter;

use serde_json::Value;

/// One raw sample accepted from a producer.
///
/// Carries no timestamp: records are stamped when the drain task pulls
/// them, so queue dwell time shows up in the persisted timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Producer-chosen source label, e.g. `"gps"` or `"esc"`
    pub source: String,
    /// Arbitrary JSON payload: scalar, array or object
    pub value: Value,
}

/// One error event accepted from a producer.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub source: String,
    /// Producer-side capture time, milliseconds since the Unix epoch
    pub timestamp_ms: i64,
    pub message: String,
}

/// Latest value per source, in first-report order.
///
/// Re-reports replace the value but keep the source's original
/// position, so summary lines list sources stably across intervals.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    entries: Vec<(String, Value)>,
}

impl TelemetrySnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value for `source`.
    pub fn insert(&mut self, source: &str, value: Value) {
        match self.entries.iter_mut().find(|(name, _)| name == source) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((source.to_string(), value)),
        }
    }

    /// Folds `other` into `self`; `other`'s values win on conflict.
    pub fn merge(&mut self, other: TelemetrySnapshot) {
        for (source, value) in other.entries {
            self.insert(&source, value);
        }
    }

    #[must_use]
    pub fn get(&self, source: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
