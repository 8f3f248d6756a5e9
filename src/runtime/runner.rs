use crate::runtime::telemetry::{self, Telemetry};
use crate::scanner::{IncrementalScanner, IncrementalScannerHandle, IncrementalScannerParams};
use anyhow::{bail, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns the scanner lifecycle and handles OS signals for graceful shutdowns.
pub struct Runner {
    scanner: Option<IncrementalScanner>,
    handle: Option<IncrementalScannerHandle>,
    metrics: Option<MetricsReporter>,
    shutdown: CancellationToken,
}

struct MetricsReporter {
    telemetry: Arc<Telemetry>,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl Runner {
    pub fn new(params: IncrementalScannerParams) -> Self {
        Self {
            scanner: Some(IncrementalScanner::new(params)),
            handle: None,
            metrics: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Like [`Runner::new`], but reports into `telemetry` and periodically
    /// logs its snapshots while running.
    pub fn with_telemetry(mut params: IncrementalScannerParams, telemetry: Arc<Telemetry>) -> Self {
        let interval = params.config.metrics_interval();
        params.reporter = telemetry.clone();
        let mut runner = Self::new(params);
        runner.metrics = Some(MetricsReporter {
            telemetry,
            interval,
            task: None,
        });
        runner
    }

    /// Root shutdown token. A terminal scanner error cancels it too.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn latest_handled_block(&self) -> Option<u64> {
        self.handle.as_ref().map(|handle| handle.latest_handled_block())
    }

    /// Starts the scanner loop. A runner can only be started once.
    pub async fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let Some(scanner) = self.scanner.take() else {
            bail!("runner already stopped; build a new one to scan again");
        };

        let handle = scanner.spawn(&self.shutdown);
        if let Some(metrics) = self.metrics.as_mut() {
            metrics.task = Some(telemetry::spawn_metrics_reporter(
                metrics.telemetry.clone(),
                handle.handled_height(),
                handle.cancellation_token(),
                metrics.interval,
            ));
        }
        self.handle = Some(handle);
        Ok(())
    }

    /// Stops the scanner and returns its terminal error, if it had one.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let result = handle.stop().await;
        if let Some(task) = self.metrics.as_mut().and_then(|metrics| metrics.task.take()) {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "metrics reporter task panicked");
            }
        }
        result
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the scanner terminates.
    pub async fn run_until_ctrl_c(&mut self) -> Result<()> {
        self.start().await?;
        tracing::info!("runner started; waiting for Ctrl-C (SIGINT) to initiate shutdown");

        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received; shutting down runner");
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("runner shutdown token cancelled");
            }
        }

        self.stop().await
    }
}
