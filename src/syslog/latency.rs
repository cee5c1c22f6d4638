//! # Write Latency Module
//!
//! Rolling window of recent flush latencies, surfaced through the
//! health API.

use std::collections::VecDeque;

/// Number of most-recent write samples the window keeps.
pub const LATENCY_WINDOW: usize = 5;

/// Aggregated view of the rolling window. All zeroes until the first
/// sample lands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteLatencyStats {
    pub max_us: u64,
    pub avg_us: u64,
}

/// Fixed-size window of per-write latencies in microseconds.
#[derive(Debug, Default)]
pub struct WriteLatencyWindow {
    samples: VecDeque<u64>,
}

impl WriteLatencyWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one write latency, evicting the oldest sample once the
    /// window is full.
    pub fn record(&mut self, micros: u64) {
        self.samples.push_back(micros);
        if self.samples.len() > LATENCY_WINDOW {
            self.samples.pop_front();
        }
    }

    /// Maximum and integer-average latency over the current window.
    #[must_use]
    pub fn stats(&self) -> WriteLatencyStats {
        if self.samples.is_empty() {
            return WriteLatencyStats::default();
        }
        let max_us = self.samples.iter().copied().max().unwrap_or(0);
        let sum: u64 = self.samples.iter().sum();
        WriteLatencyStats {
            max_us,
            avg_us: sum / self.samples.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window_reports_zeroes() {
        let window = WriteLatencyWindow::new();
        assert_eq!(window.stats(), WriteLatencyStats { max_us: 0, avg_us: 0 });
    }

    #[test]
    fn test_partial_window() {
        let mut window = WriteLatencyWindow::new();
        window.record(100);
        window.record(300);
        assert_eq!(window.stats(), WriteLatencyStats { max_us: 300, avg_us: 200 });
    }

    #[test]
    fn test_window_keeps_last_five() {
        let mut window = WriteLatencyWindow::new();
        for us in [1, 2, 3, 4, 5, 6, 7] {
            window.record(us);
        }
        // Window is now [3, 4, 5, 6, 7]
        assert_eq!(window.stats(), WriteLatencyStats { max_us: 7, avg_us: 5 });
    }

    #[test]
    fn test_average_truncates() {
        let mut window = WriteLatencyWindow::new();
        window.record(1);
        window.record(2);
        assert_eq!(window.stats().avg_us, 1);
    }
}
