use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::support::{
    helpers::{
        fast_client, init_tracing, scanner_params, spawn_batch_consumer, test_config,
        wait_for_handled, wait_until, ACCOUNT_UPDATED,
    },
    mock_rpc::{MockChain, MockRpcServer},
};
use anyhow::{Context, Result};
use batchscan::{Address, IncrementalScanner, Telemetry};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scanner_follows_head_and_publishes_handled_height() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(108);
    chain.add_event(ACCOUNT_UPDATED, 102, Address::from(1));
    chain.add_transaction(103, &[Address::from(2), Address::from(1)]);
    let server = MockRpcServer::start(chain.clone()).await?;

    let telemetry = Arc::new(Telemetry::default());
    let (params, channels) = scanner_params(
        test_config(100, 1)?,
        fast_client(server.url())?,
        telemetry.clone(),
        4,
    );
    let (consumed, consumer) = spawn_batch_consumer(channels.batch_rx);

    let shutdown = CancellationToken::new();
    let handle = IncrementalScanner::new(params).spawn(&shutdown);
    let handled = handle.handled_height();

    wait_for_handled(&handled, 103, Duration::from_secs(5)).await?;
    {
        let consumed = consumed.lock().expect("consumer state poisoned");
        let expected: HashSet<Address> = [Address::from(1), Address::from(2)].into_iter().collect();
        assert_eq!(consumed.addresses(), expected);
        assert_eq!(consumed.batches.len(), 2, "batch size 1 yields one batch per address");
        assert!(consumed.batches.iter().all(|(height, _)| *height == 103));
    }

    chain.add_event(ACCOUNT_UPDATED, 106, Address::from(3));
    chain.set_head(112);
    wait_for_handled(&handled, 107, Duration::from_secs(5)).await?;
    {
        let consumed = consumed.lock().expect("consumer state poisoned");
        assert!(consumed.addresses().contains(&Address::from(3)));
    }

    wait_until("handled height report", Duration::from_secs(1), || {
        telemetry.snapshot().handled_height == 107
    })
    .await?;
    assert_eq!(telemetry.snapshot().addresses_dispatched, 3);

    timeout(Duration::from_secs(5), handle.stop())
        .await
        .context("scanner should stop promptly")??;
    consumer.abort();
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scanner_hands_wide_backlog_to_full_scan() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(400);
    chain.add_event(ACCOUNT_UPDATED, 150, Address::from(9));
    let server = MockRpcServer::start(chain.clone()).await?;

    let telemetry = Arc::new(Telemetry::default());
    let (params, mut channels) = scanner_params(
        test_config(100, 10)?,
        fast_client(server.url())?,
        telemetry.clone(),
        4,
    );

    let shutdown = CancellationToken::new();
    let handle = IncrementalScanner::new(params).spawn(&shutdown);

    let requested = timeout(Duration::from_secs(5), channels.full_scan_rx.recv())
        .await
        .context("full scan should be requested")?;
    assert_eq!(requested, Some(395));

    sleep(Duration::from_millis(100)).await;
    assert!(channels.batch_rx.try_recv().is_err(), "no detection for skipped blocks");
    assert_eq!(chain.calls("getEventsForHeightRange"), 0);
    assert_eq!(handle.latest_handled_block(), 100);
    assert_eq!(telemetry.snapshot().full_scan_requests, 1);

    handle.stop().await?;
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dispatch_waits_for_a_slow_consumer() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(108);
    chain.add_transaction(
        101,
        &[Address::from(1), Address::from(2), Address::from(3)],
    );
    let server = MockRpcServer::start(chain.clone()).await?;

    let telemetry = Arc::new(Telemetry::default());
    let (params, mut channels) = scanner_params(
        test_config(100, 1)?,
        fast_client(server.url())?,
        telemetry.clone(),
        1,
    );

    let shutdown = CancellationToken::new();
    let handle = IncrementalScanner::new(params).spawn(&shutdown);

    let first = timeout(Duration::from_secs(5), channels.batch_rx.recv())
        .await
        .context("first batch should arrive")?
        .context("batch channel open")?;
    sleep(Duration::from_millis(150)).await;

    assert_eq!(
        chain.calls("getLatestBlockHeader"),
        1,
        "scanner must stay blocked on dispatch instead of polling again"
    );
    assert_eq!(handle.latest_handled_block(), 100);

    let mut batches = vec![first];
    for _ in 0..2 {
        let batch = timeout(Duration::from_secs(5), channels.batch_rx.recv())
            .await
            .context("remaining batches should arrive")?
            .context("batch channel open")?;
        batches.push(batch);
    }
    let ordered: Vec<Address> = batches
        .iter()
        .flat_map(|batch| batch.addresses().iter().copied())
        .collect();
    assert_eq!(
        ordered,
        vec![Address::from(1), Address::from(2), Address::from(3)]
    );

    for batch in batches {
        batch.complete();
    }
    wait_for_handled(&handle.handled_height(), 103, Duration::from_secs(5)).await?;

    handle.stop().await?;
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_batch_keeps_watermark_behind() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(108);
    chain.add_event(ACCOUNT_UPDATED, 101, Address::from(4));
    let server = MockRpcServer::start(chain.clone()).await?;

    let telemetry = Arc::new(Telemetry::default());
    let (params, mut channels) = scanner_params(
        test_config(100, 10)?,
        fast_client(server.url())?,
        telemetry.clone(),
        4,
    );

    let shutdown = CancellationToken::new();
    let handle = IncrementalScanner::new(params).spawn(&shutdown);

    let batch = timeout(Duration::from_secs(5), channels.batch_rx.recv())
        .await
        .context("batch should arrive")?
        .context("batch channel open")?;
    batch.fail(anyhow::anyhow!("script execution failed"));
    sleep(Duration::from_millis(100)).await;

    assert_eq!(handle.latest_handled_block(), 100);
    assert_eq!(telemetry.snapshot().handled_reports, 0);
    assert!(handle.error().is_none(), "batch failures are not terminal");

    handle.stop().await?;
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn node_failure_terminates_scanner() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(108);
    chain.fail_next("getLatestBlockHeader", usize::MAX);
    let server = MockRpcServer::start(chain.clone()).await?;

    let telemetry = Arc::new(Telemetry::default());
    let (params, _channels) = scanner_params(
        test_config(100, 10)?,
        fast_client(server.url())?,
        telemetry,
        4,
    );

    let shutdown = CancellationToken::new();
    let handle = IncrementalScanner::new(params).spawn(&shutdown);

    let err = timeout(Duration::from_secs(5), handle.wait())
        .await
        .context("scanner should terminate on its own")?
        .expect_err("header failure is terminal");
    let message = format!("{err:#}");
    assert!(
        message.contains("could not get latest block header"),
        "unexpected error: {message}"
    );
    assert!(shutdown.is_cancelled());

    wait_until("no further polls", Duration::from_millis(200), || {
        chain.calls("getLatestBlockHeader") == 2
    })
    .await?;

    server.shutdown().await;
    Ok(())
}
