//! Per-range completion tracking for dispatched address batches.

use super::cursor::HandledHeight;
use crate::runtime::reporter::StatusReporter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub batches: usize,
    pub failed: usize,
}

impl CompletionOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Default)]
struct CompletionInner {
    issued: AtomicUsize,
    pending: AtomicUsize,
    failed: AtomicUsize,
    notify: Notify,
}

/// Countdown over the batches of one block range.
///
/// Every batch carries a [`BatchTicket`]; the group resolves once all issued
/// tickets are settled, successfully or not.
#[derive(Debug, Clone, Default)]
pub struct CompletionGroup {
    inner: Arc<CompletionInner>,
}

impl CompletionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self) -> BatchTicket {
        self.inner.issued.fetch_add(1, Ordering::SeqCst);
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        BatchTicket {
            inner: Arc::clone(&self.inner),
            settled: false,
        }
    }

    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) -> CompletionOutcome {
        loop {
            let notified = self.inner.notify.notified();
            if self.inner.pending.load(Ordering::SeqCst) == 0 {
                return CompletionOutcome {
                    batches: self.inner.issued.load(Ordering::SeqCst),
                    failed: self.inner.failed.load(Ordering::SeqCst),
                };
            }
            notified.await;
        }
    }
}

/// Settlement slot for one batch. Dropping an unsettled ticket marks the
/// batch as failed.
#[derive(Debug)]
pub struct BatchTicket {
    inner: Arc<CompletionInner>,
    settled: bool,
}

impl BatchTicket {
    pub fn succeed(mut self) {
        self.settle(true);
    }

    fn settle(&mut self, success: bool) {
        if self.settled {
            return;
        }
        self.settled = true;
        if !success {
            self.inner.failed.fetch_add(1, Ordering::SeqCst);
        }
        if self.inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}

impl Drop for BatchTicket {
    fn drop(&mut self) {
        self.settle(false);
    }
}

/// Waits for every batch of the range ending at `height`, then publishes the
/// handled watermark and reports it once.
pub(crate) fn spawn_completion_tracker(
    group: CompletionGroup,
    height: u64,
    handled: HandledHeight,
    reporter: Arc<dyn StatusReporter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = group.wait().await;
        if !outcome.all_succeeded() {
            tracing::warn!(
                height,
                batches = outcome.batches,
                failed = outcome.failed,
                "address batches failed downstream; handled height not advanced"
            );
            return;
        }

        let watermark = handled.publish(height);
        if watermark > height {
            tracing::debug!(
                height,
                watermark,
                "range completed after a later range; watermark unchanged"
            );
        }
        tracing::debug!(height, batches = outcome.batches, "block range handled");
        reporter.report_handled_height(watermark);
    })
}
