//! # System Log Module
//!
//! Diagnostic logging with synchronous console mirroring and batched
//! persistence.
//!
//! This module handles:
//! - Timestamped free-text log lines, mirrored to the console first
//! - Batched flushing into rotating `log_NNN.txt` segments
//! - Flush-on-threshold with a bounded timeout fallback
//! - Read-back and clear operations for the HTTP layer
//!
//! The console write happens before the line is queued, so diagnostics
//! stay visible on a serial console even when persistent storage is
//! dead.

pub mod latency;

pub use latency::WriteLatencyStats;

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::clock::{format_log_stamp, TimeAuthority};
use crate::config::SyslogConfig;
use crate::queue::Queue;
use crate::storage::SegmentStore;
use latency::WriteLatencyWindow;

struct SyslogInner {
    queue: Queue<String>,
    store: Mutex<SegmentStore>,
    console: Mutex<Box<dyn Write + Send>>,
    clock: Arc<dyn TimeAuthority>,
    flush_wakeup: Notify,
    latency: Mutex<WriteLatencyWindow>,
    queue_drops: AtomicU64,
    batch_threshold: usize,
    flush_timeout: Duration,
}

/// Cloneable handle to the diagnostic log.
///
/// `log()` is cheap and non-blocking; persistence happens in the
/// writer task spawned with [`SystemLog::run_writer`].
#[derive(Clone)]
pub struct SystemLog {
    inner: Arc<SyslogInner>,
}

impl SystemLog {
    /// Creates a log writing to stdout and the configured directory.
    #[must_use]
    pub fn new(config: &SyslogConfig, clock: Arc<dyn TimeAuthority>) -> Self {
        Self::with_console(config, clock, Box::new(io::stdout()))
    }

    /// Creates a log with an explicit console sink. Tests use this to
    /// capture console output.
    #[must_use]
    pub fn with_console(
        config: &SyslogConfig,
        clock: Arc<dyn TimeAuthority>,
        console: Box<dyn Write + Send>,
    ) -> Self {
        let store = SegmentStore::open(config.segment_store_config());
        Self {
            inner: Arc::new(SyslogInner {
                queue: Queue::new(config.queue_capacity),
                store: Mutex::new(store),
                console: Mutex::new(console),
                clock,
                flush_wakeup: Notify::new(),
                latency: Mutex::new(WriteLatencyWindow::new()),
                queue_drops: AtomicU64::new(0),
                batch_threshold: config.batch_threshold,
                flush_timeout: Duration::from_millis(config.flush_timeout_ms),
            }),
        }
    }

    /// Logs one message: `<DD-Mon-YYYY HH:MM:SS.mmm> <message>`.
    ///
    /// The line goes to the console immediately, then onto the flush
    /// queue. A full queue drops the line from persistence (counted)
    /// and says so on the console; the caller is never blocked.
    pub fn log(&self, message: &str) {
        let line = format!("{} {message}\n", format_log_stamp(&self.inner.clock.now()));
        self.write_console(&line);

        if self.inner.queue.try_put(line).is_err() {
            self.inner.queue_drops.fetch_add(1, Ordering::Relaxed);
            let marker = format!(
                "{} Log queue full, message not persisted\n",
                format_log_stamp(&self.inner.clock.now())
            );
            self.write_console(&marker);
        }

        if self.inner.queue.len() >= self.inner.batch_threshold {
            self.inner.flush_wakeup.notify_one();
        }
    }

    fn write_console(&self, line: &str) {
        let mut console = self
            .inner
            .console
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // A failed console write has nowhere left to be reported
        let _ = console.write_all(line.as_bytes());
    }

    /// Runs the flush loop: wakes when the queue crosses the batch
    /// threshold or the flush timeout elapses, whichever comes first.
    pub async fn run_writer(self) {
        info!(
            timeout_ms = self.inner.flush_timeout.as_millis() as u64,
            threshold = self.inner.batch_threshold,
            "System log writer started"
        );
        loop {
            let _ = tokio::time::timeout(
                self.inner.flush_timeout,
                self.inner.flush_wakeup.notified(),
            )
            .await;
            self.flush_pending();
        }
    }

    /// Drains queued lines and persists them as one append.
    ///
    /// Called by the writer task and once more at shutdown so the tail
    /// of the log survives a clean exit.
    pub fn flush_pending(&self) {
        let lines = self.inner.queue.drain();
        if lines.is_empty() {
            return;
        }
        let batch = lines.concat();

        let started = Instant::now();
        let result = self
            .inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(batch.as_bytes());
        match result {
            Ok(()) => {
                let elapsed_us = started.elapsed().as_micros() as u64;
                self.inner
                    .latency
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record(elapsed_us);
            }
            Err(err) => {
                warn!(lines = lines.len(), error = %err, "Failed to flush log batch");
            }
        }
    }

    // ==================== Read-back API ====================

    /// Highest persisted segment index, `-1` when none exist.
    #[must_use]
    pub fn latest_segment_index(&self) -> i64 {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest_index()
            .map_or(-1, |index| index as i64)
    }

    /// Full content of one persisted segment.
    #[must_use]
    pub fn read_segment(&self, index: u64) -> Option<Bytes> {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read(index)
    }

    /// Deletes every persisted log segment. Queued lines are kept and
    /// land in the fresh segment on the next flush.
    pub fn clear_all_segments(&self) -> bool {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear_all()
    }

    /// Rolling latency of recent segment flushes.
    #[must_use]
    pub fn write_latency_stats(&self) -> WriteLatencyStats {
        self.inner
            .latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
    }

    /// Lines dropped because the flush queue was full.
    #[must_use]
    pub fn queue_drops(&self) -> u64 {
        self.inner.queue_drops.load(Ordering::Relaxed)
    }

    /// Lines queued but not yet flushed.
    #[must_use]
    pub fn pending_lines(&self) -> usize {
        self.inner.queue.len()
    }

    /// True when the backing store failed its bootstrap.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_disabled()
    }

    /// Batches swallowed by a disabled store.
    #[must_use]
    pub fn dropped_writes(&self) -> u64 {
        self.inner
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dropped_writes()
    }
}
