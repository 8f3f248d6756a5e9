use crate::rpc::types::Address;
use crate::rpc::ChainClient;
use anyhow::{bail, Error as AnyError, Result};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Inclusive range of block heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if start > end {
            bail!("block range start {start} is above end {end}");
        }
        Ok(Self { start, end })
    }

    pub fn single(height: u64) -> Self {
        Self {
            start: height,
            end: height,
        }
    }

    /// Number of heights covered by the range.
    pub fn height_count(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn heights(&self) -> impl Iterator<Item = u64> {
        self.start..=self.end
    }

    /// Splits the range into consecutive sub-ranges of at most `max_len`
    /// heights.
    pub fn chunks(&self, max_len: u64) -> Vec<BlockRange> {
        let max_len = max_len.max(1);
        let mut chunks = Vec::new();
        let mut start = self.start;
        loop {
            let end = start.saturating_add(max_len - 1).min(self.end);
            chunks.push(BlockRange { start, end });
            if end == self.end {
                break;
            }
            start = end + 1;
        }
        chunks
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Addresses flagged by one or more detectors over a block range.
#[derive(Debug, Default)]
pub struct CandidateResult {
    pub addresses: HashSet<Address>,
    pub error: Option<AnyError>,
}

impl CandidateResult {
    pub fn from_addresses(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
            error: None,
        }
    }

    pub fn from_error(error: AnyError) -> Self {
        Self {
            addresses: HashSet::new(),
            error: Some(error),
        }
    }

    pub fn err(&self) -> Option<&AnyError> {
        self.error.as_ref()
    }

    /// Unions the addresses of `other` into `self`, keeping the first error.
    pub fn merge(&mut self, other: CandidateResult) {
        self.addresses.extend(other.addresses);
        if self.error.is_none() {
            self.error = other.error;
        }
    }

    pub fn into_result(self) -> Result<HashSet<Address>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.addresses),
        }
    }
}

impl From<Result<HashSet<Address>>> for CandidateResult {
    fn from(result: Result<HashSet<Address>>) -> Self {
        match result {
            Ok(addresses) => Self::from_addresses(addresses),
            Err(err) => Self::from_error(err),
        }
    }
}

/// Finds addresses that may have changed within a block range.
///
/// Implementations should stop early once `cancel` fires.
pub trait CandidateDetector: Send + Sync {
    fn name(&self) -> &str;

    fn scan<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        client: &'a dyn ChainClient,
        range: BlockRange,
    ) -> BoxFuture<'a, CandidateResult>;
}
