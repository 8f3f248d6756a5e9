//! Retry bookkeeping for the chain client: which call is being retried, the
//! heights it covers, and how each attempt is reported.

use crate::candidates::BlockRange;
use anyhow::Error;
use std::time::Duration;

/// The access node calls the scanner issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RpcCall {
    LatestHeader,
    EventsInRange,
    BlockTransactions,
}

impl RpcCall {
    pub(crate) fn method(self) -> &'static str {
        match self {
            RpcCall::LatestHeader => "getLatestBlockHeader",
            RpcCall::EventsInRange => "getEventsForHeightRange",
            RpcCall::BlockTransactions => "getTransactionsByBlockHeight",
        }
    }

    fn subject(self) -> &'static str {
        match self {
            RpcCall::LatestHeader => "latest header request",
            RpcCall::EventsInRange => "event range request",
            RpcCall::BlockTransactions => "block transactions request",
        }
    }
}

/// One retried call plus the heights it covers, if any.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryContext {
    call: RpcCall,
    range: Option<BlockRange>,
}

impl RetryContext {
    pub(crate) fn new(call: RpcCall) -> Self {
        Self { call, range: None }
    }

    pub(crate) fn with_range(call: RpcCall, range: BlockRange) -> Self {
        Self {
            call,
            range: Some(range),
        }
    }

    pub(crate) fn method(&self) -> &'static str {
        self.call.method()
    }

    pub(crate) fn log_timeout(&self, attempt: usize, backoff: Duration) {
        let (start_height, end_height) = self.heights();
        tracing::warn!(
            method = self.method(),
            start_height,
            end_height,
            attempt,
            backoff_ms = as_millis(backoff),
            "{} timed out; retrying",
            self.call.subject()
        );
    }

    pub(crate) fn log_retry(&self, attempt: usize, backoff: Duration, err: &Error) {
        let (start_height, end_height) = self.heights();
        tracing::warn!(
            method = self.method(),
            start_height,
            end_height,
            attempt,
            backoff_ms = as_millis(backoff),
            error = %err,
            "{} failed; retrying",
            self.call.subject()
        );
    }

    pub(crate) fn log_exhausted(&self, attempt: usize, err: &Error) {
        let (start_height, end_height) = self.heights();
        tracing::error!(
            method = self.method(),
            start_height,
            end_height,
            attempt,
            error = %err,
            "{} exhausted retries",
            self.call.subject()
        );
    }

    fn heights(&self) -> (Option<u64>, Option<u64>) {
        match self.range {
            Some(range) => (Some(range.start), Some(range.end)),
            None => (None, None),
        }
    }
}

fn as_millis(backoff: Duration) -> u64 {
    u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX)
}
