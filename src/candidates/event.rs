//! Detector that flags addresses carried by a given event type.

use super::detector::{BlockRange, CandidateDetector, CandidateResult};
use crate::rpc::types::{Address, ChainEvent};
use crate::rpc::ChainClient;
use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Access nodes refuse event queries spanning more heights than this.
pub const MAX_EVENT_RANGE: u64 = 250;

pub type AddressExtractor = dyn Fn(&ChainEvent) -> Result<Address> + Send + Sync;

pub struct EventCandidateDetector {
    name: String,
    event_type: String,
    extract: Arc<AddressExtractor>,
}

impl EventCandidateDetector {
    pub fn new<F>(event_type: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&ChainEvent) -> Result<Address> + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        Self {
            name: format!("events:{event_type}"),
            event_type,
            extract: Arc::new(extract),
        }
    }

    /// Extractor for events whose payload carries the address in a top-level
    /// string field.
    pub fn payload_field(event_type: impl Into<String>, field: &'static str) -> Self {
        Self::new(event_type, move |event: &ChainEvent| {
            let raw = event
                .payload
                .get(field)
                .and_then(|value| value.as_str())
                .ok_or_else(|| anyhow!("event payload has no string field `{field}`"))?;
            raw.parse()
        })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    async fn collect(
        &self,
        cancel: &CancellationToken,
        client: &dyn ChainClient,
        range: BlockRange,
    ) -> Result<HashSet<Address>> {
        let mut addresses = HashSet::new();
        for chunk in range.chunks(MAX_EVENT_RANGE) {
            if cancel.is_cancelled() {
                return Err(anyhow!("event scan cancelled at {chunk}"));
            }

            let events = client
                .events_for_height_range(&self.event_type, chunk)
                .await
                .with_context(|| format!("failed to fetch {} events for {chunk}", self.event_type))?;

            for event in &events {
                let address = (self.extract)(event).with_context(|| {
                    format!(
                        "failed to extract address from {} event in transaction {}",
                        event.event_type, event.transaction_id
                    )
                })?;
                addresses.insert(address);
            }

            tracing::debug!(
                event_type = %self.event_type,
                start_height = chunk.start,
                end_height = chunk.end,
                events = events.len(),
                "scanned event range"
            );
        }
        Ok(addresses)
    }
}

impl CandidateDetector for EventCandidateDetector {
    fn name(&self) -> &str {
        &self.name
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
