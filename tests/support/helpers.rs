use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::{bail, Result};
use batchscan::{
    Address, AddressBatch, CandidateDetector, EventCandidateDetector, HandledHeight,
    IncrementalScannerParams, JsonRpcChainClient, RpcClientOptions, ScannerConfig,
    AuthorizerCandidateDetector, Telemetry,
};
use once_cell::sync::Lazy;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

pub const ACCOUNT_UPDATED: &str = "AccountUpdated";

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

pub fn fast_client(url: &str) -> Result<Arc<JsonRpcChainClient>> {
    let options = RpcClientOptions {
        request_timeout: Duration::from_millis(500),
        max_attempts: 2,
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(10),
        ..RpcClientOptions::default()
    };
    Ok(Arc::new(JsonRpcChainClient::with_options(url, options)?))
}

pub fn test_config(start_height: u64, batch_size: usize) -> Result<ScannerConfig> {
    ScannerConfig::builder()
        .start_height(start_height)
        .batch_size(batch_size)
        .block_lag(5)
        .max_block_gap(100)
        .poll_interval(Duration::from_millis(20))
        .metrics_interval(Duration::from_millis(50))
        .build()
}

pub fn default_detectors() -> Vec<Arc<dyn CandidateDetector>> {
    vec![
        Arc::new(EventCandidateDetector::payload_field(ACCOUNT_UPDATED, "address")),
        Arc::new(AuthorizerCandidateDetector::new()),
    ]
}

pub struct ScannerChannels {
    pub batch_rx: mpsc::Receiver<AddressBatch>,
    pub full_scan_rx: mpsc::Receiver<u64>,
}

pub fn scanner_params(
    config: ScannerConfig,
    client: Arc<JsonRpcChainClient>,
    telemetry: Arc<Telemetry>,
    batch_capacity: usize,
) -> (IncrementalScannerParams, ScannerChannels) {
    let (batch_tx, batch_rx) = mpsc::channel(batch_capacity);
    let (full_scan_tx, full_scan_rx) = mpsc::channel(4);
    (
        IncrementalScannerParams {
            config,
            client,
            detectors: default_detectors(),
            batch_tx,
            full_scan_tx,
            reporter: telemetry,
        },
        ScannerChannels {
            batch_rx,
            full_scan_rx,
        },
    )
}

#[derive(Default)]
pub struct ConsumedBatches {
    pub batches: Vec<(u64, Vec<Address>)>,
}

impl ConsumedBatches {
    pub fn addresses(&self) -> HashSet<Address> {
        self.batches
            .iter()
            .flat_map(|(_, addresses)| addresses.iter().copied())
            .collect()
    }
}

/// Completes every batch it receives and records what it saw.
pub fn spawn_batch_consumer(
    mut batch_rx: mpsc::Receiver<AddressBatch>,
) -> (Arc<Mutex<ConsumedBatches>>, JoinHandle<()>) {
    let consumed = Arc::new(Mutex::new(ConsumedBatches::default()));
    let sink = consumed.clone();
    let handle = tokio::spawn(async move {
        while let Some(batch) = batch_rx.recv().await {
            sink.lock()
                .expect("consumer state poisoned")
                .batches
                .push((batch.height(), batch.addresses().to_vec()));
            batch.complete();
        }
    });
    (consumed, handle)
}

pub async fn wait_for_handled(handled: &HandledHeight, target: u64, timeout: Duration) -> Result<()> {
    let start = Instant::now();
    loop {
        let current = handled.get();
        if current >= target {
            return Ok(());
        }
        if start.elapsed() > timeout {
            bail!("handled height did not reach {target} within {timeout:?} (current: {current})");
        }
        sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_until<F>(description: &str, timeout: Duration, mut condition: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    loop {
        if condition() {
            return Ok(());
        }
        if start.elapsed() > timeout {
            bail!("timed out after {timeout:?} waiting for {description}");
        }
        sleep(Duration::from_millis(10)).await;
    }
}
