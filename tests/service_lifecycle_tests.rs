mod support;

use std::sync::Arc;
use std::time::Duration;

use easyswap_sync::chain::ChainClient;
use easyswap_sync::config::DbConfig;
use easyswap_sync::domain::ProjectScope;
use easyswap_sync::error::Error;
use easyswap_sync::service::{ServiceBuilder, ServiceState, Supervisor};
use easyswap_sync::testkit::chain::MockChainClient;
use easyswap_sync::testkit::memory_kv;
use support::{eventually, Harness, SETTLE};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn unsupported_chain_starts_order_manager_only() {
    let harness = Harness::new("unsupported-chain", 99999);
    let mut service = harness.build().await.unwrap();
    assert!(!service.has_indexer());

    service.start().await.unwrap();
    assert_eq!(service.state(), ServiceState::Running);
    assert_eq!(service.running_loops(), 1);

    service.shutdown(SETTLE).await.unwrap();
    assert_eq!(service.running_loops(), 0);
    assert_eq!(harness.client.block_number_calls(), 0);
}

#[tokio::test]
async fn supported_chains_get_an_indexer() {
    for chain_id in [1, 10, 11_155_111] {
        let harness = Harness::new("supported-chain", chain_id);
        let service = harness.build().await.unwrap();
        assert!(service.has_indexer(), "chain {chain_id} has no indexer");
        assert_eq!(service.running_loops(), 0, "construction spawned a loop");
    }
}

#[tokio::test]
async fn preload_failure_aborts_start_before_any_loop() {
    let harness = Harness::new("preload-failure", 1);
    let mut service = harness.build().await.unwrap();
    harness.db.execute("DROP TABLE collections");

    let err = service.start().await.unwrap_err();
    assert!(matches!(err, Error::Preload(_)), "unexpected error: {err}");
    assert!(err.to_string().starts_with("failed on preload collection to filter"));
    assert_eq!(service.state(), ServiceState::Constructed);
    assert_eq!(service.running_loops(), 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.client.block_number_calls(), 0);
}

#[tokio::test]
async fn preload_snapshot_matches_store_for_scope() {
    let harness = Harness::new("preload-snapshot", 1);
    let store = harness.db.store();
    let scope = harness.scope();
    store
        .insert_collection(&scope, "0x00000000000000000000000000000000000000A1", "a")
        .await
        .unwrap();
    store
        .insert_collection(&scope, "0x00000000000000000000000000000000000000a2", "b")
        .await
        .unwrap();
    store
        .insert_collection(
            &ProjectScope::new("sepolia", "easyswap"),
            "0x00000000000000000000000000000000000000a3",
            "other chain",
        )
        .await
        .unwrap();

    let service = harness.start().await;
    assert_eq!(
        service.collection_filter().snapshot(),
        vec![
            "0x00000000000000000000000000000000000000a1",
            "0x00000000000000000000000000000000000000a2",
        ]
    );
    service.shutdown(SETTLE).await.unwrap();
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let harness = Harness::new("start-twice", 99999);
    let mut service = harness.start().await;
    assert!(matches!(service.start().await, Err(Error::AlreadyStarted)));
    assert_eq!(service.running_loops(), 1);
    service.shutdown(SETTLE).await.unwrap();
}

#[tokio::test]
async fn claimed_order_manager_blocks_indexer_start() {
    let harness = Harness::new("manager-claimed", 1);
    harness.client.set_head(100);
    let mut service = harness.build().await.unwrap();

    let elsewhere = Arc::new(Supervisor::new(CancellationToken::new()));
    service.order_manager().start(&elsewhere).unwrap();

    assert!(matches!(service.start().await, Err(Error::AlreadyStarted)));
    assert_eq!(service.state(), ServiceState::Constructed);
    assert_eq!(service.running_loops(), 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.client.block_number_calls(), 0);

    elsewhere.token().cancel();
    tokio::time::timeout(SETTLE, elsewhere.wait()).await.unwrap();
}

#[tokio::test]
async fn cancelling_parent_stops_every_loop() {
    let harness = Harness::new("cancel-parent", 1);
    let service = harness.start().await;
    assert_eq!(service.running_loops(), 2);

    harness.shutdown.cancel();
    tokio::time::timeout(SETTLE, service.cancelled()).await.unwrap();
    tokio::time::timeout(SETTLE, service.wait()).await.unwrap();
    assert_eq!(service.running_loops(), 0);
    assert!(service.failure().is_none());
}

#[tokio::test]
async fn cancelling_service_leaves_parent_alive() {
    let harness = Harness::new("cancel-child", 1);
    let service = harness.start().await;
    service.shutdown(SETTLE).await.unwrap();
    assert!(!harness.shutdown.is_cancelled());
}

#[tokio::test]
async fn indexer_polls_chain_after_start() {
    let harness = Harness::new("end-to-end", 1);
    harness.client.set_head(100);
    let (kv, nodes) = memory_kv(&[2]);
    let client: Arc<dyn ChainClient> = harness.client.clone();

    let mut service = ServiceBuilder::new(harness.config.clone())
        .kv_store(kv)
        .db_pool(harness.db.pool().clone())
        .chain_client(client)
        .build(&harness.shutdown)
        .await
        .unwrap();
    assert!(service.has_indexer());
    assert_eq!(service.kv().topology()[0].weight, 2);

    service.start().await.unwrap();
    assert!(harness.client.wait_polled(SETTLE).await);

    // The indexer records progress in the cache once a range is done.
    let key = service.indexer().unwrap().sync_height_key();
    let cached = eventually(SETTLE, || async {
        service.kv().get(&key).await.unwrap().is_some()
    })
    .await;
    assert!(cached);
    assert_eq!(nodes.iter().map(|n| n.len()).sum::<usize>(), 1);

    service.shutdown(SETTLE).await.unwrap();
}

#[tokio::test]
async fn failing_loop_cancels_the_service() {
    let harness = Harness::new("loop-failure", 1);
    let mut service = harness.build().await.unwrap();
    harness.db.execute("DROP TABLE indexed_status");

    service.start().await.unwrap();
    tokio::time::timeout(SETTLE, service.cancelled()).await.unwrap();
    tokio::time::timeout(SETTLE, service.wait()).await.unwrap();

    let failure = service.failure().unwrap();
    assert!(failure.starts_with("orderbook_indexer:"), "{failure}");
    assert!(!harness.shutdown.is_cancelled());
}

#[tokio::test]
async fn mismatched_chain_client_is_rejected() {
    let harness = Harness::new("chain-mismatch", 1);
    let client: Arc<dyn ChainClient> = Arc::new(MockChainClient::new(10));
    let err = ServiceBuilder::new(harness.config.clone())
        .db_pool(harness.db.pool().clone())
        .chain_client(client)
        .build(&harness.shutdown)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Construction {
            component: "chain client",
            ..
        }
    ));
}

#[tokio::test]
async fn unreachable_store_fails_construction() {
    let harness = Harness::new("bad-store", 1);
    let mut config = harness.config.clone();
    config.db = DbConfig {
        path: "/nonexistent/easyswap-sync/sync.db".into(),
        max_connections: 1,
        connect_timeout_ms: 200,
    };
    let client: Arc<dyn ChainClient> = harness.client.clone();

    let err = ServiceBuilder::new(config)
        .chain_client(client)
        .build(&harness.shutdown)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Construction {
            component: "relational store",
            ..
        }
    ));
}
