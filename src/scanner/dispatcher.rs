use super::batch::AddressBatch;
use super::completion::CompletionGroup;
use super::error::ScanError;
use crate::rpc::types::Address;
use std::collections::HashSet;
use tokio::sync::mpsc;

/// Splits candidate sets into bounded batches and pushes them downstream.
///
/// Sends wait for channel capacity, so a slow consumer stalls the scanner
/// instead of letting batches pile up.
#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    batch_size: usize,
    batch_tx: mpsc::Sender<AddressBatch>,
}

/// Batches handed downstream for one range.
#[derive(Debug)]
pub struct DispatchedRange {
    pub group: CompletionGroup,
    pub batches: usize,
    pub addresses: usize,
}

impl BatchDispatcher {
    pub fn new(batch_size: usize, batch_tx: mpsc::Sender<AddressBatch>) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch_tx,
        }
    }

    /// Sends `addresses` as batches tagged with `height`.
    ///
    /// Returns `None` when there is nothing to send.
    pub async fn dispatch(
        &self,
        addresses: HashSet<Address>,
        height: u64,
    ) -> Result<Option<DispatchedRange>, ScanError> {
        if addresses.is_empty() {
            return Ok(None);
        }

        let mut ordered: Vec<Address> = addresses.into_iter().collect();
        ordered.sort_unstable();
        let expected = batch_count(ordered.len(), self.batch_size);
        tracing::trace!(height, expected_batches = expected, "dispatching address batches");

        let group = CompletionGroup::new();
        let mut batches = 0usize;
        for chunk in ordered.chunks(self.batch_size) {
            let ticket = group.ticket();
            let batch = AddressBatch::new(chunk.to_vec(), height, move || ticket.succeed(), None);
            self.batch_tx
                .send(batch)
                .await
                .map_err(|_| ScanError::BatchChannelClosed { height })?;
            batches += 1;
        }
        debug_assert_eq!(batches, expected);

        tracing::debug!(
            height,
            batches,
            addresses = ordered.len(),
            batch_size = self.batch_size,
            "dispatched address batches"
        );

        Ok(Some(DispatchedRange {
            group,
            batches,
            addresses: ordered.len(),
        }))
    }
}

/// Number of batches `count` addresses split into.
fn batch_count(count: usize, batch_size: usize) -> usize {
    count.div_ceil(batch_size.max(1))
}
