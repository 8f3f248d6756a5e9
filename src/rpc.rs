//! Chain access: the `ChainClient` seam, its JSON-RPC implementation, retry
//! policy, metrics, and the wire types.

pub mod client;
pub mod metrics;
pub mod options;
pub mod retry;
pub mod types;

pub use client::{ChainClient, JsonRpcChainClient, RpcError};
pub use metrics::RpcMetricsSnapshot;
pub use options::RpcClientOptions;
pub use types::{Address, BlockHeader, ChainEvent, TransactionSummary};
