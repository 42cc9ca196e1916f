//! Block poller against a fake node HTTP API

use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wavescache::blocks::BlockPoller;
use wavescache::cache::{CacheInvalidator, CacheStore};
use wavescache::error::OriginError;
use wavescache::node::{NodeApi, NodeClient, Origin};
use wavescache::observer::{RecordingObserver, TransactionObserver};

fn block_json(height: u64) -> serde_json::Value {
    json!({
        "signature": format!("sig{}", height),
        "height": height,
        "transactions": [
            {
                "type": 4,
                "id": format!("transfer{}", height),
                "sender": format!("3NS{}", height),
                "assetId": null,
                "timestamp": 1529366206373u64,
                "amount": 1000000000,
                "fee": 100000,
                "recipient": format!("3NR{}", height),
                "attachment": ""
            },
            {
                "type": 7,
                "id": format!("exchange{}", height),
                "sender": "3NMatcher"
            }
        ]
    })
}

async fn mock_height(server: &MockServer, height: u64) {
    server
        .mock_async(|when, then| {
            when.method(GET).path("/blocks/height");
            then.status(200).json_body(json!({ "height": height }));
        })
        .await;
}

fn poller(server: &MockServer, observer: Arc<dyn TransactionObserver>) -> BlockPoller {
    let client = NodeClient::new(&server.base_url(), Duration::from_secs(5)).unwrap();
    let node: Arc<dyn NodeApi> = Arc::new(client);
    BlockPoller::new(
        node,
        observer,
        Duration::from_secs(3600),
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn test_first_poll_fast_forwards() {
    let server = MockServer::start_async().await;
    mock_height(&server, 100).await;
    let any_block = server
        .mock_async(|when, then| {
            when.method(GET).path_contains("/blocks/at/");
            then.status(200).json_body(block_json(1));
        })
        .await;

    let observer = Arc::new(RecordingObserver::new());
    let poller = poller(&server, observer.clone());
    poller.poll_once().await.unwrap();

    assert_eq!(poller.cursor(), 100);
    assert_eq!(any_block.hits_async().await, 0);
    assert!(observer.transfers().is_empty());
}

#[tokio::test]
async fn test_walks_blocks_below_height() {
    let server = MockServer::start_async().await;
    mock_height(&server, 53).await;
    let mut blocks = Vec::new();
    for height in 50..=53u64 {
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/blocks/at/{}", height));
                then.status(200).json_body(block_json(height));
            })
            .await;
        blocks.push(mock);
    }

    let observer = Arc::new(RecordingObserver::new());
    let poller = poller(&server, observer.clone()).with_cursor(50);
    poller.poll_once().await.unwrap();

    assert_eq!(poller.cursor(), 53);
    for mock in &blocks[..3] {
        assert_eq!(mock.hits_async().await, 1);
    }
    assert_eq!(blocks[3].hits_async().await, 0);
    assert_eq!(
        observer.transfers(),
        vec![
            ("3NS50".to_string(), "3NR50".to_string()),
            ("3NS51".to_string(), "3NR51".to_string()),
            ("3NS52".to_string(), "3NR52".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_open_tip_is_read_again() {
    let server = MockServer::start_async().await;
    mock_height(&server, 53).await;
    let tip = server
        .mock_async(|when, then| {
            when.method(GET).path("/blocks/at/52");
            then.status(200).json_body(block_json(52));
        })
        .await;

    let poller = poller(&server, Arc::new(RecordingObserver::new())).with_cursor(52);
    poller.poll_once().await.unwrap();
    assert_eq!(poller.cursor(), 53);
    assert_eq!(tip.hits_async().await, 1);
}

#[tokio::test]
async fn test_failed_block_aborts_cycle() {
    let server = MockServer::start_async().await;
    mock_height(&server, 53).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/blocks/at/50");
            then.status(200).json_body(block_json(50));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/blocks/at/51");
            then.status(503);
        })
        .await;

    let poller = poller(&server, Arc::new(RecordingObserver::new())).with_cursor(50);
    let err = poller.poll_once().await.unwrap_err();

    assert_eq!(err, OriginError::Status(503));
    assert_eq!(poller.cursor(), 50);
}

#[tokio::test]
async fn test_malformed_height_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/blocks/height");
            then.status(200).body("not json");
        })
        .await;

    let poller = poller(&server, Arc::new(RecordingObserver::new()));
    assert!(matches!(
        poller.poll_once().await,
        Err(OriginError::InvalidBody(_))
    ));
    assert_eq!(poller.cursor(), 0);
}

#[tokio::test]
async fn test_polled_transfer_invalidates_cache() {
    let server = MockServer::start_async().await;
    mock_height(&server, 51).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/blocks/at/50");
            then.status(200).json_body(block_json(50));
        })
        .await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET).path("/transactions/address/3NR50/limit/10");
            then.status(200).body("[[]]");
        })
        .await;

    let client = NodeClient::new(&server.base_url(), Duration::from_secs(5)).unwrap();
    let origin: Arc<dyn Origin> = Arc::new(client);
    let cache = Arc::new(CacheStore::new(origin));
    cache
        .fetch_or_populate("transactions/address/3NR50/limit/10", Some("3NR50"))
        .await
        .unwrap();
    assert_eq!(cache.len(), 1);

    let poller = poller(&server, Arc::new(CacheInvalidator::new(cache.clone()))).with_cursor(50);
    poller.poll_once().await.unwrap();

    assert!(cache.is_empty());
    assert_eq!(list.hits_async().await, 1);
}
