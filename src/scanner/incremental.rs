//! Incremental scanning loop.
//!
//! Each tick polls the finalized head, trails it by the configured lag and
//! either hands the new range to the candidate detectors or, when the backlog
//! is too wide, asks the full scanner to take over from the new height.
//! Detected addresses are batched downstream and a completion tracker per
//! range publishes the handled watermark once every batch is confirmed.

use super::batch::AddressBatch;
use super::completion::spawn_completion_tracker;
use super::cursor::{HandledHeight, ScanCursor};
use super::dispatcher::BatchDispatcher;
use super::error::ScanError;
use crate::candidates::{BlockRange, CandidateAggregator, CandidateDetector};
use crate::rpc::ChainClient;
use crate::runtime::config::ScannerConfig;
use crate::runtime::fatal::FatalErrorHandler;
use crate::runtime::reporter::StatusReporter;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub struct IncrementalScannerParams {
    pub config: ScannerConfig,
    pub client: Arc<dyn ChainClient>,
    pub detectors: Vec<Arc<dyn CandidateDetector>>,
    pub batch_tx: mpsc::Sender<AddressBatch>,
    pub full_scan_tx: mpsc::Sender<u64>,
    pub reporter: Arc<dyn StatusReporter>,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The effective head is not above the last submitted height.
    UpToDate,
    /// The backlog exceeded the gap limit and a full scan was requested.
    FullScanRequested { height: u64 },
    Processed {
        range: BlockRange,
        batches: usize,
        addresses: usize,
    },
}

pub struct IncrementalScanner {
    client: Arc<dyn ChainClient>,
    aggregator: CandidateAggregator,
    dispatcher: BatchDispatcher,
    full_scan_tx: mpsc::Sender<u64>,
    reporter: Arc<dyn StatusReporter>,
    cursor: ScanCursor,
    block_lag: u64,
    max_block_gap: u64,
    poll_interval: Duration,
}

impl IncrementalScanner {
    pub fn new(params: IncrementalScannerParams) -> Self {
        let IncrementalScannerParams {
            config,
            client,
            detectors,
            batch_tx,
            full_scan_tx,
            reporter,
        } = params;

        debug_assert!(
            config.validate().is_ok(),
            "ScannerConfig should have been validated at construction time"
        );

        Self {
            aggregator: CandidateAggregator::new(client.clone(), detectors),
            dispatcher: BatchDispatcher::new(config.batch_size(), batch_tx),
            client,
            full_scan_tx,
            reporter,
            cursor: ScanCursor::new(config.start_height()),
            block_lag: config.block_lag(),
            max_block_gap: config.max_block_gap(),
            poll_interval: config.poll_interval(),
        }
    }

    /// Highest height submitted for processing.
    pub fn latest_block(&self) -> u64 {
        self.cursor.latest_block()
    }

    pub fn latest_handled_block(&self) -> u64 {
        self.cursor.latest_handled_block()
    }

    pub fn handled_height(&self) -> HandledHeight {
        self.cursor.handled().clone()
    }

    /// Runs one polling iteration.
    ///
    /// Every error returned here is terminal for the scanner. When the failure
    /// happens while scanning a range, the cursor has already moved past it.
    pub async fn scan_new_blocks(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<TickOutcome, ScanError> {
        let header = self
            .client
            .latest_header(true)
            .await
            .map_err(ScanError::LatestHeader)?;

        let effective = header.height.saturating_sub(self.block_lag);
        let latest = self.cursor.latest_block();
        if effective <= latest {
            return Ok(TickOutcome::UpToDate);
        }

        let backlog = effective - latest;
        self.reporter.report_backlog_size(backlog);

        if backlog > self.max_block_gap {
            tracing::info!(
                latest_block = latest,
                current_block = effective,
                diff = backlog,
                "backlog exceeds max block gap; skipping blocks and requesting full scan"
            );
            self.cursor.advance_to(effective);
            self.full_scan_tx
                .send(effective)
                .await
                .map_err(|_| ScanError::FullScanChannelClosed { height: effective })?;
            self.reporter.report_full_scan_requested(effective);
            return Ok(TickOutcome::FullScanRequested { height: effective });
        }

        let range = BlockRange {
            start: latest + 1,
            end: effective,
        };
        tracing::info!(
            start = range.start,
            end = range.end,
            diff = backlog,
            "processing block range"
        );

        let outcome = self.scan_block_range(cancel, range).await;
        self.cursor.advance_to(effective);
        outcome
    }

    async fn scan_block_range(
        &self,
        cancel: &CancellationToken,
        range: BlockRange,
    ) -> Result<TickOutcome, ScanError> {
        let addresses = self
            .aggregator
            .run(cancel, range)
            .await
            .into_result()
            .map_err(|source| ScanError::Candidates { range, source })?;

        if addresses.is_empty() {
            return Ok(TickOutcome::Processed {
                range,
                batches: 0,
                addresses: 0,
            });
        }

        tracing::info!(
            count = addresses.len(),
            start = range.start,
            end = range.end,
            "found candidates in block range"
        );

        let Some(dispatched) = self.dispatcher.dispatch(addresses, range.end).await? else {
            return Ok(TickOutcome::Processed {
                range,
                batches: 0,
                addresses: 0,
            });
        };

        self.reporter
            .report_batches_dispatched(dispatched.batches, dispatched.addresses);
        spawn_completion_tracker(
            dispatched.group,
            range.end,
            self.cursor.handled().clone(),
            self.reporter.clone(),
        );

        Ok(TickOutcome::Processed {
            range,
            batches: dispatched.batches,
            addresses: dispatched.addresses,
        })
    }

    /// Moves the scanner onto its own task and starts polling.
    ///
    /// The first poll happens immediately. The loop stops when `shutdown` (or
    /// the handle's own token) is cancelled, or on the first terminal error,
    /// which also cancels `shutdown`.
    pub fn spawn(mut self, shutdown: &CancellationToken) -> IncrementalScannerHandle {
        let run_token = shutdown.child_token();
        let fatal = FatalErrorHandler::new(shutdown.clone(), run_token.clone());
        let handled = self.handled_height();

        let loop_token = run_token.clone();
        let loop_fatal = fatal.clone();
        let join = tokio::spawn(async move {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                start_height = self.cursor.latest_block(),
                block_lag = self.block_lag,
                max_block_gap = self.max_block_gap,
                "incremental scanner started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => {
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = self.scan_new_blocks(&loop_token).await {
                            if loop_token.is_cancelled() {
                                tracing::debug!(
                                    error = format!("{:#}", anyhow::Error::from(err)),
                                    "scan interrupted by shutdown"
                                );
                            } else {
                                loop_fatal.trigger(err);
                            }
                            break;
                        }
                    }
                }
            }

            tracing::info!(
                latest_block = self.cursor.latest_block(),
                latest_handled_block = self.cursor.latest_handled_block(),
                "incremental scanner stopped"
            );
        });

        IncrementalScannerHandle {
            run_token,
            handled,
            fatal,
            join,
        }
    }
}

/// Control surface for a running scanner.
pub struct IncrementalScannerHandle {
    run_token: CancellationToken,
    handled: HandledHeight,
    fatal: FatalErrorHandler,
    join: JoinHandle<()>,
}

impl IncrementalScannerHandle {
    pub fn latest_handled_block(&self) -> u64 {
        self.handled.get()
    }

    pub fn handled_height(&self) -> HandledHeight {
        self.handled.clone()
    }

    /// Token that stops this scanner run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.run_token.clone()
    }

    /// Terminal error captured so far, if any.
    pub fn error(&self) -> Option<anyhow::Error> {
        self.fatal.error()
    }

    /// Waits for the loop to exit on its own and returns its terminal error.
    pub async fn wait(self) -> Result<()> {
        if let Err(err) = self.join.await {
            return Err(self
                .fatal
                .trigger_external("incremental scanner task", err.into()));
        }

        match self.fatal.error() {
            Some(err) => Err(err).context("incremental scanner aborted"),
            None => Ok(()),
        }
    }

    /// Cancels the loop and waits for it to exit.
    pub async fn stop(self) -> Result<()> {
        self.run_token.cancel();
        self.wait().await
    }
}
