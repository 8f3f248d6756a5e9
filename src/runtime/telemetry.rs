use crate::runtime::reporter::StatusReporter;
use crate::scanner::cursor::HandledHeight;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// How often the status line is logged when no interval is configured.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(5);

const DEFAULT_LOG_FILTER: &str = "info,batchscan=debug";

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, or by
/// `info,batchscan=debug` when the variable is unset. Only the first call
/// installs anything; an already active global subscriber is left alone.
pub fn init_tracing() {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .try_init();
    });
}

/// Gauges and counters fed by the scanner through [`StatusReporter`].
#[derive(Default, Debug)]
pub struct Telemetry {
    backlog_size: AtomicU64,
    handled_height: AtomicU64,
    handled_reports: AtomicU64,
    backlog_reports: AtomicU64,
    full_scan_requests: AtomicU64,
    last_full_scan_height: AtomicU64,
    batches_dispatched: AtomicU64,
    addresses_dispatched: AtomicU64,
}

impl StatusReporter for Telemetry {
    fn report_backlog_size(&self, blocks: u64) {
        self.backlog_size.store(blocks, Ordering::Relaxed);
        self.backlog_reports.fetch_add(1, Ordering::Relaxed);
    }

    fn report_handled_height(&self, height: u64) {
        // Trackers for different ranges may report out of order.
        self.handled_height.fetch_max(height, Ordering::Relaxed);
        self.handled_reports.fetch_add(1, Ordering::Relaxed);
    }

    fn report_full_scan_requested(&self, height: u64) {
        self.full_scan_requests.fetch_add(1, Ordering::Relaxed);
        self.last_full_scan_height.store(height, Ordering::Relaxed);
    }

    fn report_batches_dispatched(&self, batches: usize, addresses: usize) {
        self.batches_dispatched
            .fetch_add(batches as u64, Ordering::Relaxed);
        self.addresses_dispatched
            .fetch_add(addresses as u64, Ordering::Relaxed);
    }
}

impl Telemetry {
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            backlog_size: self.backlog_size.load(Ordering::Relaxed),
            backlog_reports: self.backlog_reports.load(Ordering::Relaxed),
            handled_height: self.handled_height.load(Ordering::Relaxed),
            handled_reports: self.handled_reports.load(Ordering::Relaxed),
            full_scan_requests: self.full_scan_requests.load(Ordering::Relaxed),
            last_full_scan_height: self.last_full_scan_height.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            addresses_dispatched: self.addresses_dispatched.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub backlog_size: u64,
    pub backlog_reports: u64,
    pub handled_height: u64,
    pub handled_reports: u64,
    pub full_scan_requests: u64,
    pub last_full_scan_height: u64,
    pub batches_dispatched: u64,
    pub addresses_dispatched: u64,
}

/// Spawns a background task that periodically logs dispatch throughput, the
/// backlog, and the handled watermark.
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    handled: HandledHeight,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut previous = telemetry.snapshot();
        let mut previous_at = Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "batchscan::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let now = telemetry.snapshot();
                    let secs = previous_at.elapsed().as_secs_f64();
                    let addresses_per_sec = match now
                        .addresses_dispatched
                        .saturating_sub(previous.addresses_dispatched)
                    {
                        0 => 0.0,
                        _ if secs <= f64::EPSILON => 0.0,
                        delta => delta as f64 / secs,
                    };

                    tracing::info!(
                        target: "batchscan::metrics",
                        addresses_per_sec = format!("{addresses_per_sec:.2}"),
                        backlog = now.backlog_size,
                        handled_height = handled.get(),
                        batches = now.batches_dispatched,
                        addresses = now.addresses_dispatched,
                        full_scan_requests = now.full_scan_requests,
                        "scanner status"
                    );

                    previous = now;
                    previous_at = Instant::now();
                }
            }
        }
    })
}
