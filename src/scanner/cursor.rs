use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Highest height whose address batches have all been confirmed downstream.
///
/// Cloning shares the underlying value. Publication only ever raises the
/// watermark, so trackers finishing out of range order cannot move it back.
#[derive(Debug, Clone)]
pub struct HandledHeight {
    value: Arc<AtomicU64>,
}

impl HandledHeight {
    pub fn new(initial: u64) -> Self {
        Self {
            value: Arc::new(AtomicU64::new(initial)),
        }
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Raises the watermark to `height` if it is higher and returns the
    /// resulting watermark.
    pub fn publish(&self, height: u64) -> u64 {
        let previous = self.value.fetch_max(height, Ordering::SeqCst);
        previous.max(height)
    }
}

/// Scan progress owned by the incremental scanner.
///
/// `latest_block` is only touched by the scanner's own loop; the handled
/// watermark is shared with completion trackers and observers.
#[derive(Debug)]
pub struct ScanCursor {
    latest_block: u64,
    handled: HandledHeight,
}

impl ScanCursor {
    pub fn new(start_height: u64) -> Self {
        Self {
            latest_block: start_height,
            handled: HandledHeight::new(start_height),
        }
    }

    pub fn latest_block(&self) -> u64 {
        self.latest_block
    }

    pub(crate) fn advance_to(&mut self, height: u64) {
        debug_assert!(
            height >= self.latest_block,
            "cursor must never move backward"
        );
        self.latest_block = height;
    }

    pub fn latest_handled_block(&self) -> u64 {
        self.handled.get()
    }

    pub fn handled(&self) -> &HandledHeight {
        &self.handled
    }
}
