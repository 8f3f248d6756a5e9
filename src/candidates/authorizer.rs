//! Detector that flags every account authorizing a transaction in the range.

use super::detector::{BlockRange, CandidateDetector, CandidateResult};
use crate::rpc::types::Address;
use crate::rpc::ChainClient;
use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone, Copy)]
pub struct AuthorizerCandidateDetector;

impl AuthorizerCandidateDetector {
    pub fn new() -> Self {
        Self
    }

    async fn collect(
        &self,
        cancel: &CancellationToken,
        client: &dyn ChainClient,
        range: BlockRange,
    ) -> Result<HashSet<Address>> {
        let mut addresses = HashSet::new();
        let mut transactions = 0usize;
        for height in range.heights() {
            if cancel.is_cancelled() {
                return Err(anyhow!("authorizer scan cancelled at height {height}"));
            }

            let block_transactions = client
                .transactions_at_height(height)
                .await
                .with_context(|| format!("failed to fetch transactions at height {height}"))?;
            transactions += block_transactions.len();
            for tx in block_transactions {
                addresses.extend(tx.authorizers);
            }
        }

        tracing::debug!(
            start_height = range.start,
            end_height = range.end,
            transactions,
            authorizers = addresses.len(),
            "scanned transaction authorizers"
        );
        Ok(addresses)
    }
}

impl CandidateDetector for AuthorizerCandidateDetector {
    fn name(&self) -> &str {
        "authorizers"
    }

    fn scan<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        client: &'a dyn ChainClient,
        range: BlockRange,
    ) -> BoxFuture<'a, CandidateResult> {
        Box::pin(async move {
            let collected = self.collect(cancel, client, range).await;
            CandidateResult::from(collected)
        })
    }
}
