pub mod candidates;
pub mod rpc;
pub mod runtime;
pub mod scanner;


pub use candidates::{
    AuthorizerCandidateDetector, BlockRange, CandidateAggregator, CandidateDetector,
    CandidateResult, EventCandidateDetector,
};
pub use rpc::{
    Address, BlockHeader, ChainClient, ChainEvent, JsonRpcChainClient, RpcClientOptions,
    RpcError, RpcMetricsSnapshot, TransactionSummary,
};
pub use runtime::config::{ScannerConfig, ScannerConfigBuilder, ScannerConfigParams};
pub use runtime::fatal::{FatalError, FatalErrorHandler};
pub use runtime::reporter::StatusReporter;
pub use runtime::runner::Runner;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use scanner::{
    AddressBatch, HandledHeight, IncrementalScanner, IncrementalScannerHandle,
    IncrementalScannerParams, ScanError, TickOutcome,
};
