//! # Blackbox Library
//!
//! Rotating telemetry and diagnostic log recorder for sensor-equipped rigs.
//!
//! This library provides the core recording pipeline: bounded async
//! queues between sensor producers and drain tasks, size-rotated
//! append-only segment files with retention, interval aggregation of
//! telemetry into human-readable summaries, and a batched diagnostic
//! log with console mirroring.

pub mod config;
pub mod error;
pub mod clock;
pub mod queue;
pub mod storage;
pub mod syslog;
pub mod telemetry;
