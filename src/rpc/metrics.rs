//! Request counters for the chain client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// How a single RPC attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallOutcome {
    Success,
    Failed,
    TimedOut,
}

#[derive(Debug, Default)]
pub(crate) struct RpcMetrics {
    requests: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    retries: AtomicU64,
    latency_us: AtomicU64,
    max_latency_us: AtomicU64,
}

impl RpcMetrics {
    pub(crate) fn record(&self, outcome: CallOutcome, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.latency_us.fetch_add(micros, Ordering::Relaxed);
        self.max_latency_us.fetch_max(micros, Ordering::Relaxed);
        match outcome {
            CallOutcome::Success => {}
            CallOutcome::Failed => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            CallOutcome::TimedOut => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RpcMetricsSnapshot {
        let total_requests = self.requests.load(Ordering::Relaxed);
        let latency_us = self.latency_us.load(Ordering::Relaxed);
        let average_latency_ms = if total_requests == 0 {
            0.0
        } else {
            latency_us as f64 / total_requests as f64 / 1_000.0
        };

        RpcMetricsSnapshot {
            total_requests,
            total_errors: self.errors.load(Ordering::Relaxed),
            total_timeouts: self.timeouts.load(Ordering::Relaxed),
            total_retries: self.retries.load(Ordering::Relaxed),
            average_latency_ms,
            max_latency_ms: self.max_latency_us.load(Ordering::Relaxed) as f64 / 1_000.0,
        }
    }
}

/// Point-in-time view of the client's request counters. Timeouts are also
/// counted as errors.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RpcMetricsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_timeouts: u64,
    pub total_retries: u64,
    pub average_latency_ms: f64,
    pub max_latency_ms: f64,
}

impl RpcMetricsSnapshot {
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_errors as f64 / self.total_requests as f64
        }
    }
}
