//! Tuning for [`JsonRpcChainClient`](crate::rpc::JsonRpcChainClient): how long
//! a single call may take, how many may be in flight, and how failed calls
//! are backed off.

use anyhow::{ensure, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RpcClientOptions {
    /// Deadline for one attempt of one call.
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    /// Attempts per call, the first one included.
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RpcClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_concurrent_requests: 64,
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RpcClientOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        ensure!(
            !self.request_timeout.is_zero(),
            "request_timeout must be greater than 0"
        );
        ensure!(
            self.max_concurrent_requests > 0,
            "max_concurrent_requests must be greater than 0"
        );
        ensure!(self.max_attempts > 0, "max_attempts must be greater than 0");
        ensure!(
            !self.initial_backoff.is_zero(),
            "initial_backoff must be greater than 0"
        );
        ensure!(
            self.max_backoff >= self.initial_backoff,
            "max_backoff ({:?}) must not be smaller than initial_backoff ({:?})",
            self.max_backoff,
            self.initial_backoff
        );
        Ok(())
    }

    /// Sleep before the retry that follows failed attempt `attempt`
    /// (1-based): `initial_backoff` doubled per attempt, capped at
    /// `max_backoff`.
    pub(crate) fn backoff_delay(&self, attempt: usize) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31) as u32;
        self.initial_backoff
            .saturating_mul(1 << doublings)
            .min(self.max_backoff)
    }
}
