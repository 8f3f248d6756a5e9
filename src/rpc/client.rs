//! Chain client abstraction consumed by the scanner and candidate detectors,
//! plus the JSON-RPC implementation used against real access nodes.

use crate::candidates::BlockRange;
use crate::rpc::metrics::{CallOutcome, RpcMetrics, RpcMetricsSnapshot};
use crate::rpc::options::RpcClientOptions;
use crate::rpc::retry::{RetryContext, RpcCall};
use crate::rpc::types::{BlockHeader, ChainEvent, TransactionSummary};
use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use jsonrpsee::core::client::{ClientT, Error as JsonRpcError};
use jsonrpsee::core::traits::ToRpcParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::de::DeserializeOwned;
use std::{future::Future, sync::Arc};
use tokio::time::{sleep, timeout, Instant};

#[derive(Debug)]
pub enum RpcError {
    Timeout { method: &'static str },
    Call { method: &'static str, message: String },
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Timeout { method } => write!(f, "rpc method {method} timed out"),
            RpcError::Call { method, message } => {
                write!(f, "rpc {method} call failed: {message}")
            }
        }
    }
}

impl std::error::Error for RpcError {}

/// Read access to the chain needed by the incremental scanner.
pub trait ChainClient: Send + Sync {
    fn latest_header(&self, finalized: bool) -> BoxFuture<'_, Result<BlockHeader>>;

    fn events_for_height_range<'a>(
        &'a self,
        event_type: &'a str,
        range: BlockRange,
    ) -> BoxFuture<'a, Result<Vec<ChainEvent>>>;

    fn transactions_at_height(&self, height: u64) -> BoxFuture<'_, Result<Vec<TransactionSummary>>>;
}

#[derive(Debug, Clone)]
pub struct JsonRpcChainClient {
    rpc_url: Arc<String>,
    client: HttpClient,
    options: RpcClientOptions,
    metrics: Arc<RpcMetrics>,
}

impl ChainClient for JsonRpcChainClient {
    fn latest_header(&self, finalized: bool) -> BoxFuture<'_, Result<BlockHeader>> {
        Box::pin(self.get_latest_header(finalized))
    }

    fn events_for_height_range<'a>(
        &'a self,
        event_type: &'a str,
        range: BlockRange,
    ) -> BoxFuture<'a, Result<Vec<ChainEvent>>> {
        Box::pin(self.get_events_for_height_range(event_type, range))
    }

    fn transactions_at_height(&self, height: u64) -> BoxFuture<'_, Result<Vec<TransactionSummary>>> {
        Box::pin(self.get_transactions_by_height(height))
    }
}

impl JsonRpcChainClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_options(url, RpcClientOptions::default())
    }

    pub fn with_options(url: impl Into<String>, options: RpcClientOptions) -> Result<Self> {
        options.validate()?;

        let rpc_url = url.into();
        let client = HttpClientBuilder::default()
            .request_timeout(options.request_timeout)
            .max_concurrent_requests(options.max_concurrent_requests)
            .build(&rpc_url)
            .map_err(|err| anyhow!("failed to build RPC client: {err}"))?;

        Ok(Self {
            rpc_url: Arc::new(rpc_url),
            client,
            options,
            metrics: Arc::new(RpcMetrics::default()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.rpc_url
    }

    pub fn metrics(&self) -> RpcMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn get_latest_header(&self, finalized: bool) -> Result<BlockHeader> {
        let context = RetryContext::new(RpcCall::LatestHeader);
        let header: BlockHeader = self
            .retry(context, || self.call(context.method(), rpc_params![finalized]))
            .await?;
        tracing::debug!(height = header.height, finalized, "fetched latest block header");
        Ok(header)
    }

    pub async fn get_events_for_height_range(
        &self,
        event_type: &str,
        range: BlockRange,
    ) -> Result<Vec<ChainEvent>> {
        let context = RetryContext::with_range(RpcCall::EventsInRange, range);
        self.retry(context, || {
            self.call(
                context.method(),
                rpc_params![event_type, range.start, range.end],
            )
        })
        .await
    }

    pub async fn get_transactions_by_height(&self, height: u64) -> Result<Vec<TransactionSummary>> {
        let range = BlockRange::single(height);
        let context = RetryContext::with_range(RpcCall::BlockTransactions, range);
        self.retry(context, || self.call(context.method(), rpc_params![height]))
            .await
    }

    async fn call<T, P>(&self, method: &'static str, params: P) -> Result<T>
    where
        T: DeserializeOwned,
        P: ToRpcParams + Send,
    {
        timeout(
            self.options.request_timeout,
            self.client.request(method, params),
        )
        .await
        .map_err(|_| RpcError::Timeout { method })?
        .map_err(|err| map_rpc_error(method, err))
    }

    /// Retry loop with exponential backoff, metrics, and consistent logging.
    /// Every error is retried until `max_attempts` is reached.
    async fn retry<T, F, Fut>(&self, context: RetryContext, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let start = Instant::now();

            match operation().await {
                Ok(value) => {
                    self.metrics.record(CallOutcome::Success, start.elapsed());
                    return Ok(value);
                }
                Err(err) => {
                    let elapsed = start.elapsed();
                    let timed_out = matches!(
                        err.downcast_ref::<RpcError>(),
                        Some(RpcError::Timeout { .. })
                    );
                    let outcome = if timed_out {
                        CallOutcome::TimedOut
                    } else {
                        CallOutcome::Failed
                    };
                    self.metrics.record(outcome, elapsed);

                    if attempt >= self.options.max_attempts {
                        context.log_exhausted(attempt, &err);
                        return Err(err);
                    }

                    let backoff = self.options.backoff_delay(attempt);
                    if timed_out {
                        context.log_timeout(attempt, backoff);
                    } else {
                        context.log_retry(attempt, backoff, &err);
                    }
                    self.metrics.record_retry();
                    sleep(backoff).await;
                }
            }
        }
    }
}

fn map_rpc_error(method: &'static str, err: JsonRpcError) -> anyhow::Error {
    let message = match err {
        JsonRpcError::Call(object) => {
            format!("code={}, message={}", object.code(), object.message())
        }
        other => other.to_string(),
    };
    RpcError::Call { method, message }.into()
}
