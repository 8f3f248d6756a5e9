//! Fan-out/join over every registered detector for one block range.

use super::detector::{BlockRange, CandidateDetector, CandidateResult};
use crate::rpc::ChainClient;
use anyhow::anyhow;
use futures::FutureExt;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct CandidateAggregator {
    client: Arc<dyn ChainClient>,
    detectors: Vec<Arc<dyn CandidateDetector>>,
}

impl CandidateAggregator {
    pub fn new(client: Arc<dyn ChainClient>, detectors: Vec<Arc<dyn CandidateDetector>>) -> Self {
        Self { client, detectors }
    }

    /// Runs every detector over `range` concurrently and merges their results.
    ///
    /// Always waits for all detectors, even after one has failed; the merged
    /// result carries the first error received.
    pub async fn run(&self, cancel: &CancellationToken, range: BlockRange) -> CandidateResult {
        let expected = self.detectors.len();
        let (results_tx, results_rx) = mpsc::channel(expected.max(1));

        for detector in &self.detectors {
            let detector = Arc::clone(detector);
            let client = Arc::clone(&self.client);
            let cancel = cancel.clone();
            let results_tx = results_tx.clone();
            tokio::spawn(async move {
                let outcome = std::panic::AssertUnwindSafe(detector.scan(
                    &cancel,
                    client.as_ref(),
                    range,
                ))
                .catch_unwind()
                .await;

                let result = match outcome {
                    Ok(result) => result,
                    Err(panic_payload) => {
                        let panic_msg = panic_message(panic_payload.as_ref());
                        tracing::error!(
                            detector = detector.name(),
                            panic = %panic_msg,
                            "candidate detector panicked"
                        );
                        CandidateResult::from_error(anyhow!(
                            "candidate detector {} panicked: {panic_msg}",
                            detector.name()
                        ))
                    }
                };

                if let Some(err) = result.err() {
                    tracing::warn!(
                        detector = detector.name(),
                        start_height = range.start,
                        end_height = range.end,
                        error = %err,
                        "candidate detector failed"
                    );
                }

                // The receiver only disappears if the aggregator itself was dropped.
                let _ = results_tx.send(result).await;
            });
        }
        drop(results_tx);

        wait_for_candidate_results(results_rx, expected).await
    }
}

/// Receives exactly `expected` results and merges them into one.
///
/// If the channel closes early, the missing results become an error.
pub async fn wait_for_candidate_results(
    mut results: mpsc::Receiver<CandidateResult>,
    expected: usize,
) -> CandidateResult {
    let mut merged = CandidateResult::default();
    for received in 0..expected {
        match results.recv().await {
            Some(result) => merged.merge(result),
            None => {
                merged.merge(CandidateResult::from_error(anyhow!(
                    "candidate results channel closed after {received} of {expected} results"
                )));
                break;
            }
        }
    }
    merged
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
