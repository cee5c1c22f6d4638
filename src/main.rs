//! # Blackbox
//!
//! Rotating telemetry and diagnostic log recorder for sensor-equipped rigs.
//!
//! This binary wires the recording pipeline together: producers report
//! samples through the ingestion router, periodic tasks drain them into
//! rotating JSONL segments, and diagnostics flow through a batched
//! system log with console mirroring.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde_json::json;
use tokio::time::{interval, Duration};
use tracing::info;
use tracing_subscriber;

use blackbox::clock::{epoch_millis, SystemClock, TimeAuthority};
use blackbox::config::Config;
use blackbox::queue::Queue;
use blackbox::storage::SegmentStore;
use blackbox::syslog::SystemLog;
use blackbox::telemetry::{Compactor, ErrorReporter, SampleDrain, TelemetryRouter};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Seconds between pipeline status log messages
const STATUS_INTERVAL_SECS: u64 = 30;

/// Milliseconds between synthetic feed reports
const FEED_INTERVAL_MS: u64 = 1000;

/// Main entry point for the Blackbox recorder
///
/// Initializes the pipeline and runs until interrupted.
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration (argument path, `config/default.toml`, or defaults)
///    - Open the telemetry and diagnostic segment stores
///
/// 2. **Pipeline Tasks**
///    - System log writer: batches diagnostic lines into `log_NNN.txt`
///    - Sample drain: raw queue to JSONL segments every 300 ms
///    - Aggregation compactor: one `DATA | ...` summary line per 5 s
///    - Error reporter: deduplicated `ERR ...` lines per 30 s
///    - Synthetic feed: stand-in producer reporting counter-driven samples
///
/// 3. **Main Loop**
///    - Log pipeline status every 30 s
///    - Handle Ctrl+C for graceful shutdown, flushing queued diagnostics
///
/// # Errors
///
/// Returns error if the configuration file cannot be read or fails
/// validation. Storage failures never abort the process: a namespace
/// whose directory cannot be created keeps running with persistence
/// disabled.
///
/// # Examples
///
/// Run the recorder:
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO blackbox: Blackbox v0.1.0 starting...
/// INFO blackbox::storage: Segment store ready dir=./data active_index=0 recovered=0
/// INFO blackbox::syslog: System log writer started timeout_ms=3000 threshold=10
/// 10-Feb-2024 08:15:00.250 Recorder started
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; the guard must live until exit so buffered
    // lines are not lost
    let (console_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .with_writer(console_writer)
        .init();

    info!("Blackbox v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)?,
        None => {
            info!("No configuration file found, using defaults");
            Config::default()
        }
    };

    let clock: Arc<dyn TimeAuthority> = Arc::new(SystemClock);
    let syslog = SystemLog::new(&config.syslog, Arc::clone(&clock));
    let telemetry_store = Arc::new(Mutex::new(SegmentStore::open(
        config.telemetry.segment_store_config(),
    )));
    let router = Arc::new(TelemetryRouter::new(
        config.telemetry.raw_queue_capacity,
        config.telemetry.error_queue_capacity,
    ));
    let aggregate_queue = Arc::new(Queue::new(config.telemetry.aggregate_queue_capacity));

    tokio::spawn(syslog.clone().run_writer());
    tokio::spawn(
        SampleDrain::new(
            router.sample_queue(),
            Arc::clone(&aggregate_queue),
            Arc::clone(&telemetry_store),
            Arc::clone(&clock),
            Duration::from_millis(config.telemetry.drain_interval_ms),
        )
        .run(),
    );
    tokio::spawn(
        Compactor::new(
            Arc::clone(&aggregate_queue),
            syslog.clone(),
            Duration::from_millis(config.telemetry.aggregate_interval_ms),
        )
        .run(),
    );
    tokio::spawn(
        ErrorReporter::new(
            router.error_queue(),
            syslog.clone(),
            Duration::from_millis(config.telemetry.dedup_interval_ms),
        )
        .run(),
    );

    // TODO: Replace the synthetic feed with device reader tasks
    tokio::spawn(feed_synthetic_samples(Arc::clone(&router), Arc::clone(&clock)));

    syslog.log("Recorder started");
    info!("Recording pipeline running");
    info!("Press Ctrl+C to exit");

    let mut status_interval = interval(Duration::from_secs(STATUS_INTERVAL_SECS));

    // Main status loop
    loop {
        tokio::select! {
            _ = status_interval.tick() => {
                let stats = router.stats();
                let latency = syslog.write_latency_stats();
                let data_segment = telemetry_store
                    .lock()
                    .map(|store| store.latest_index().map_or(-1, |index| index as i64))
                    .unwrap_or(-1);
                info!(
                    "Status: {} samples pending ({} dropped), {} errors pending ({} dropped), data segment {}, log segment {}, flush avg {}us",
                    stats.samples_pending,
                    stats.samples_dropped,
                    stats.errors_pending,
                    stats.errors_dropped,
                    data_segment,
                    syslog.latest_segment_index(),
                    latency.avg_us,
                );
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    let stats = router.stats();
    info!(
        samples_dropped = stats.samples_dropped,
        errors_dropped = stats.errors_dropped,
        log_drops = syslog.queue_drops(),
        "Final ingestion counters"
    );
    syslog.log("Recorder shutting down");
    syslog.flush_pending();
    info!("Shutdown complete");

    Ok(())
}

/// Synthetic producer standing in for device reader tasks.
///
/// Reports counter-driven values so the whole pipeline (drain,
/// aggregation, segments) runs and can be observed without hardware
/// attached.
async fn feed_synthetic_samples(router: Arc<TelemetryRouter>, clock: Arc<dyn TimeAuthority>) {
    let mut feed_interval = interval(Duration::from_millis(FEED_INTERVAL_MS));
    let mut pulse: u64 = 0;

    loop {
        feed_interval.tick().await;
        pulse += 1;
        let hint = epoch_millis(&clock.now());

        router.report_data("uptime_s", hint, json!(pulse));
        router.report_data(
            "link",
            hint,
            json!({
                "rssi": -(40 + (pulse % 30) as i64),
                "lq": 100 - (pulse % 5),
            }),
        );
    }
}
