use crate::support::{
    helpers::{fast_client, init_tracing, ACCOUNT_UPDATED},
    mock_rpc::{MockChain, MockRpcServer},
};
use anyhow::Result;
use batchscan::{Address, BlockRange, ChainClient};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_decodes_all_methods() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(120);
    chain.add_event(ACCOUNT_UPDATED, 110, Address::from(7));
    chain.add_event("Other", 110, Address::from(8));
    chain.add_transaction(111, &[Address::from(1), Address::from(2)]);
    let server = MockRpcServer::start(chain.clone()).await?;
    let client = fast_client(server.url())?;

    let header = client.latest_header(true).await?;
    assert_eq!(header.height, 120);
    assert_eq!(header.id, "block-120");

    let events = client
        .events_for_height_range(ACCOUNT_UPDATED, BlockRange::new(100, 115)?)
        .await?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].block_height, 110);
    assert_eq!(events[0].payload["address"], "0x0000000000000007");

    let transactions = client.transactions_at_height(111).await?;
    assert_eq!(transactions.len(), 1);
    assert_eq!(
        transactions[0].authorizers,
        vec![Address::from(1), Address::from(2)]
    );

    let metrics = client.metrics();
    assert_eq!(metrics.total_requests, 3);
    assert_eq!(metrics.total_errors, 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_retries_transient_node_errors() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(50);
    chain.fail_next("getLatestBlockHeader", 1);
    let server = MockRpcServer::start(chain.clone()).await?;
    let client = fast_client(server.url())?;

    let header = client.latest_header(true).await?;
    assert_eq!(header.height, 50);
    assert_eq!(chain.calls("getLatestBlockHeader"), 2);

    let metrics = client.metrics();
    assert_eq!(metrics.total_retries, 1);
    assert_eq!(metrics.total_errors, 1);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_surfaces_error_after_exhausting_attempts() -> Result<()> {
    init_tracing();
    let chain = MockChain::new(50);
    chain.fail_next("getTransactionsByBlockHeight", 10);
    let server = MockRpcServer::start(chain.clone()).await?;
    let client = fast_client(server.url())?;

    let err = client
        .transactions_at_height(10)
        .await
        .expect_err("node keeps failing");
    let message = format!("{err:#}");
    assert!(
        message.contains("getTransactionsByBlockHeight"),
        "error should name the method, got {message}"
    );
    assert_eq!(chain.calls("getTransactionsByBlockHeight"), 2);

    server.shutdown().await;
    Ok(())
}
