//! Incremental scanner: cursor, batch dispatch, per-range completion tracking
//! and the polling coordinator.

pub mod batch;
pub mod completion;
pub mod cursor;
pub mod dispatcher;
pub mod error;
pub mod incremental;

pub use batch::{AddressBatch, CompletionCallback, ErrorCallback};
pub use completion::{BatchTicket, CompletionGroup, CompletionOutcome};
pub use cursor::{HandledHeight, ScanCursor};
pub use dispatcher::{BatchDispatcher, DispatchedRange};
pub use error::ScanError;
pub use incremental::{
    IncrementalScanner, IncrementalScannerHandle, IncrementalScannerParams, TickOutcome,
};
