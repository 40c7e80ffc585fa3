use std::sync::Arc;
use std::time::Duration;

use laminar_block::{HashExecutor, InMemoryMempool, ProposerKey};
use laminar_config::{BlockManagerConfig, NodeConfig};
use laminar_da::DummyDa;
use laminar_node::{da_client_kv, indexer_kv, main_kv, FullNode, NoopSyncService};
use laminar_store::{InMemoryKv, KvStore, Store};
use laminar_types::NamespaceId;
use tokio::time::sleep;

const TEST_NAMESPACE: NamespaceId = NamespaceId([0xca, 0xfe, 0, 0, 0, 0, 0, 1]);

fn test_config(aggregator: bool) -> NodeConfig {
    NodeConfig {
        aggregator,
        lazy_aggregator: false,
        block_manager: BlockManagerConfig {
            block_time_ms: 30,
            da_block_time_ms: 40,
            lazy_block_time_ms: 300,
            da_start_height: 1,
            da_gas_price: -1.0,
            submit_timeout_ms: 1_000,
            namespace_id: TEST_NAMESPACE,
        },
        storage: Default::default(),
    }
}

fn new_node(
    aggregator: bool,
    da: Arc<DummyDa>,
    key: &ProposerKey,
) -> FullNode<InMemoryKv, DummyDa, HashExecutor, InMemoryMempool> {
    let config = test_config(aggregator);
    let executor = HashExecutor::new(TEST_NAMESPACE, key.address());
    FullNode::new(
        config,
        Arc::new(InMemoryKv::new()),
        da,
        executor,
        Arc::new(InMemoryMempool::new()),
        Arc::new(NoopSyncService),
        key.verifying_key(),
        aggregator.then(|| key.clone()),
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn follower_converges_to_aggregator_chain() {
    let da = Arc::new(DummyDa::new(Duration::from_millis(20)));
    let key = ProposerKey::generate();

    let mut aggregator = new_node(true, da.clone(), &key);
    let mut follower = new_node(false, da, &key);
    aggregator.start().unwrap();
    follower.start().unwrap();

    sleep(Duration::from_millis(800)).await;
    aggregator.stop().await;
    sleep(Duration::from_millis(200)).await;
    follower.stop().await;

    let agg_height = aggregator.store().height();
    let follower_height = follower.store().height();
    assert!(agg_height >= 3, "aggregator produced only {agg_height} blocks");
    assert!(
        follower_height >= 1,
        "follower should have applied DA blocks, got {follower_height}"
    );

    // applied blocks are byte-identical to the authored chain
    for h in 1..=follower_height {
        assert_eq!(
            follower.store().get_block(h).unwrap(),
            aggregator.store().get_block(h).unwrap()
        );
    }
    let follower_state = follower.manager().state();
    assert_eq!(follower_state.last_block_height, follower_height);
    assert_eq!(
        follower_state.last_block_hash,
        follower.store().get_block(follower_height).unwrap().hash()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn aggregator_requires_signing_key() {
    let config = test_config(true);
    let key = ProposerKey::generate();
    let executor = HashExecutor::new(TEST_NAMESPACE, key.address());
    let result = FullNode::new(
        config,
        Arc::new(InMemoryKv::new()),
        Arc::new(DummyDa::new(Duration::from_millis(20))),
        executor,
        Arc::new(InMemoryMempool::new()),
        Arc::new(NoopSyncService),
        key.verifying_key(),
        None,
    );
    assert!(result.is_err());
}

#[test]
fn kv_prefixes_isolate_writers() {
    let base = Arc::new(InMemoryKv::new());
    let main = main_kv(&base);
    let dalc = da_client_kv(&base);
    let indexer = indexer_kv(&base);

    main.put(b"cursor", b"main").unwrap();
    dalc.put(b"cursor", b"dalc").unwrap();
    indexer.put(b"cursor", b"indexer").unwrap();

    assert_eq!(main.get(b"cursor").unwrap(), Some(b"main".to_vec()));
    assert_eq!(dalc.get(b"cursor").unwrap(), Some(b"dalc".to_vec()));
    assert_eq!(indexer.get(b"cursor").unwrap(), Some(b"indexer".to_vec()));
}
