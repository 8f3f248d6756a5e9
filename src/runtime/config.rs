use crate::runtime::telemetry;
use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Blocks the scanner trails the finalized head by, so it never asks for data
/// that has not reached every access node yet.
pub const DEFAULT_BLOCK_LAG: u64 = 5;
/// Largest backlog handled incrementally; anything wider triggers a full scan.
pub const DEFAULT_MAX_BLOCK_GAP: u64 = 100;
pub const DEFAULT_BATCH_SIZE: usize = 1000;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Runtime configuration for the incremental scanner.
///
/// All instances must be constructed via [`ScannerConfig::builder`] or [`ScannerConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    start_height: u64,
    batch_size: usize,
    block_lag: u64,
    max_block_gap: u64,
    poll_interval: Duration,
    metrics_interval: Duration,
}

pub struct ScannerConfigParams {
    pub start_height: u64,
    pub batch_size: usize,
    pub block_lag: u64,
    pub max_block_gap: u64,
    pub poll_interval: Duration,
    pub metrics_interval: Duration,
}

impl ScannerConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> ScannerConfigBuilder {
        ScannerConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: ScannerConfigParams) -> Result<Self> {
        let ScannerConfigParams {
            start_height,
            batch_size,
            block_lag,
            max_block_gap,
            poll_interval,
            metrics_interval,
        } = params;

        let config = Self {
            start_height,
            batch_size,
            block_lag,
            max_block_gap,
            poll_interval,
            metrics_interval,
        };

        config.validate()?;
        Ok(config)
    }

    /// Height already covered by the baseline scan; incremental scanning
    /// starts right after it.
    pub fn start_height(&self) -> u64 {
        self.start_height
    }

    /// Maximum number of addresses per dispatched batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn block_lag(&self) -> u64 {
        self.block_lag
    }

    pub fn max_block_gap(&self) -> u64 {
        self.max_block_gap
    }

    /// Delay between head polls.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Interval used by the telemetry reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be greater than 0");
        }

        if self.max_block_gap == 0 {
            bail!("max_block_gap must be greater than 0");
        }

        if self.poll_interval.is_zero() {
            bail!("poll_interval must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScannerConfigBuilder {
    start_height: Option<u64>,
    batch_size: Option<usize>,
    block_lag: Option<u64>,
    max_block_gap: Option<u64>,
    poll_interval: Option<Duration>,
    metrics_interval: Option<Duration>,
}

impl ScannerConfigBuilder {
    pub fn start_height(mut self, height: u64) -> Self {
        self.start_height = Some(height);
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn block_lag(mut self, lag: u64) -> Self {
        self.block_lag = Some(lag);
        self
    }

    pub fn max_block_gap(mut self, gap: u64) -> Self {
        self.max_block_gap = Some(gap);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn build(self) -> Result<ScannerConfig> {
        let params = ScannerConfigParams {
            start_height: self.start_height.context("start_height is required")?,
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            block_lag: self.block_lag.unwrap_or(DEFAULT_BLOCK_LAG),
            max_block_gap: self.max_block_gap.unwrap_or(DEFAULT_MAX_BLOCK_GAP),
            poll_interval: self
                .poll_interval
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(telemetry::DEFAULT_METRICS_INTERVAL),
        };

        ScannerConfig::new(params)
    }
}
