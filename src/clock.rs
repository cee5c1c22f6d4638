//! # Clock Module
//!
//! Time access behind a trait so tasks can be tested without a real clock.
//!
//! This module handles:
//! - The `TimeAuthority` seam (is the clock trustworthy? what time is it?)
//! - The wall-clock implementation used by the binary
//! - Timestamp formatting shared by segment names, JSONL records and
//!   diagnostic log lines

use chrono::{DateTime, Datelike, Utc};

#[cfg(test)]
use mockall::automock;

/// Minimum year the clock must report before it is considered synced.
///
/// A device RTC that has not been set reports a default date far in the
/// past; any year below this floor means "do not trust timestamps yet".
pub const MIN_VALID_YEAR: i32 = 2023;

/// Source of current time and clock-validity for the recorder tasks.
///
/// The real implementation is [`SystemClock`]. Tests substitute a mock so
/// drain cycles can be driven through the pre-sync and post-sync states
/// deterministically.
#[cfg_attr(test, automock)]
pub trait TimeAuthority: Send + Sync {
    /// Returns true once the clock can be trusted for timestamp-derived
    /// filenames (e.g. after an NTP or GPS time fix).
    fn is_synced(&self) -> bool;

    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock `TimeAuthority` backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeAuthority for SystemClock {
    fn is_synced(&self) -> bool {
        // The OS clock is trusted as soon as it reports a plausible year.
        self.now().year() >= MIN_VALID_YEAR
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Formats a timestamp for segment file stems: `2023-05-19_15-30-00`.
pub fn format_file_stamp(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Formats a millisecond-resolution record timestamp:
/// `2023-05-19_15-30-00_123`.
pub fn format_record_stamp(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d_%H-%M-%S_%3f").to_string()
}

/// Formats the diagnostic log line prefix: `19-May-2023 15:30:00.123`.
pub fn format_log_stamp(t: &DateTime<Utc>) -> String {
    t.format("%d-%b-%Y %H:%M:%S%.3f").to_string()
}

/// Milliseconds since the Unix epoch for the given instant.
///
/// Producer APIs exchange integer-millisecond timestamps; this keeps the
/// conversion in one place.
pub fn epoch_millis(t: &DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_time() -> DateTime<Utc> {
        // 2023-05-19 15:30:00.123 UTC
        Utc.with_ymd_and_hms(2023, 5, 19, 15, 30, 0).unwrap()
            + chrono::Duration::milliseconds(123)
    }

    #[test]
    fn test_file_stamp_format() {
        assert_eq!(format_file_stamp(&sample_time()), "2023-05-19_15-30-00");
    }

    #[test]
    fn test_record_stamp_has_milliseconds() {
        assert_eq!(
            format_record_stamp(&sample_time()),
            "2023-05-19_15-30-00_123"
        );
    }

    #[test]
    fn test_log_stamp_format() {
        // Month must be the English abbreviation regardless of locale
        assert_eq!(format_log_stamp(&sample_time()), "19-May-2023 15:30:00.123");
    }

    #[test]
    fn test_log_stamp_pads_components() {
        let t = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_log_stamp(&t), "02-Jan-2024 03:04:05.000");
    }

    #[test]
    fn test_epoch_millis() {
        let t = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 1).unwrap();
        assert_eq!(epoch_millis(&t), 1000);
    }

    #[test]
    fn test_system_clock_is_synced_on_host() {
        // Host clocks report the real date, which is past the floor
        let clock = SystemClock;
        assert!(clock.now().year() >= MIN_VALID_YEAR);
        assert!(clock.is_synced());
    }

    #[test]
    fn test_min_valid_year_constant() {
        assert_eq!(MIN_VALID_YEAR, 2023);
    }

    #[test]
    fn test_mock_time_authority() {
        let mut clock = MockTimeAuthority::new();
        clock.expect_is_synced().return_const(false);
        clock
            .expect_now()
            .returning(|| Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());

        assert!(!clock.is_synced());
        assert_eq!(clock.now().year(), 2000);
    }
}
