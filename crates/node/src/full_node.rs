use std::sync::Arc;

use anyhow::{bail, Context};
use ed25519_dalek::VerifyingKey;
use laminar_block::{Executor, Manager, Mempool, ProposerKey, BROADCAST_CHANNEL_CAPACITY};
use laminar_common::tasks::{wait_termination_signal, TaskManager};
use laminar_config::NodeConfig;
use laminar_da::{DaClient, DataAvailability};
use laminar_store::{BlockStore, KvStore, PrefixKv};
use laminar_types::{Block, SignedHeader};
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::gossip::SyncService;

// KV namespaces separating main node data, DA client state and indexer data
// on the shared base store.
const MAIN_STORE_PREFIX: &str = "0";
const DA_CLIENT_PREFIX: &str = "1";
const INDEXER_PREFIX: &str = "2";

/// Main namespace; the block store and submission tracker live here.
pub fn main_kv<K: KvStore>(base: &Arc<K>) -> PrefixKv<K> {
    PrefixKv::new(base.clone(), MAIN_STORE_PREFIX)
}

/// Namespace reserved for DA client implementations that keep local state.
pub fn da_client_kv<K: KvStore>(base: &Arc<K>) -> PrefixKv<K> {
    PrefixKv::new(base.clone(), DA_CLIENT_PREFIX)
}

/// Namespace reserved for the external indexer service.
pub fn indexer_kv<K: KvStore>(base: &Arc<K>) -> PrefixKv<K> {
    PrefixKv::new(base.clone(), INDEXER_PREFIX)
}

/// A full node of the rollup network. Connects all the components and
/// orchestrates their work.
///
/// An aggregator node runs the aggregation and DA submission loops on top of
/// the retrieval and apply loops every node runs; authoring is exclusive to
/// that one role.
pub struct FullNode<K, D, E, M>
where
    K: KvStore,
    D: DataAvailability,
    E: Executor,
    M: Mempool,
{
    config: NodeConfig,
    store: Arc<BlockStore<PrefixKv<K>>>,
    manager: Arc<Manager<BlockStore<PrefixKv<K>>, D, E, M>>,
    sync_service: Arc<dyn SyncService>,
    tasks: TaskManager<()>,
    /// One token shared by all lifecycle loops: a fatal error in any loop
    /// cancels it, which stops every sibling and unblocks `wait_shutdown`.
    lifecycle: CancellationToken,
    header_rx: Option<mpsc::Receiver<SignedHeader>>,
    block_rx: Option<mpsc::Receiver<Block>>,
    inbound_tx: mpsc::Sender<Block>,
    inbound_rx: Option<mpsc::Receiver<Block>>,
}

impl<K, D, E, M> FullNode<K, D, E, M>
where
    K: KvStore,
    D: DataAvailability,
    E: Executor,
    M: Mempool,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: NodeConfig,
        base_kv: Arc<K>,
        da: Arc<D>,
        executor: E,
        mempool: Arc<M>,
        sync_service: Arc<dyn SyncService>,
        proposer: VerifyingKey,
        signer: Option<ProposerKey>,
    ) -> anyhow::Result<Self> {
        if config.aggregator && signer.is_none() {
            bail!("aggregator mode requires a proposer signing key");
        }

        let store = Arc::new(BlockStore::new(main_kv(&base_kv))?);

        let bm = &config.block_manager;
        let da_client = DaClient::new(da, bm.da_gas_price, bm.namespace_id)
            .with_submit_timeout(bm.submit_timeout());

        let (header_tx, header_rx) = mpsc::channel(BROADCAST_CHANNEL_CAPACITY);
        let (block_tx, block_rx) = mpsc::channel(BROADCAST_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(BROADCAST_CHANNEL_CAPACITY);

        let manager = Arc::new(Manager::new(
            store.clone(),
            da_client,
            executor,
            mempool,
            bm.clone(),
            proposer,
            signer,
            header_tx,
            block_tx,
        )?);

        let tasks = TaskManager::default();
        let lifecycle = tasks.child_token();

        Ok(Self {
            config,
            store,
            manager,
            sync_service,
            tasks,
            lifecycle,
            header_rx: Some(header_rx),
            block_rx: Some(block_rx),
            inbound_tx,
            inbound_rx: Some(inbound_rx),
        })
    }

    /// Spawns the lifecycle loops. Callable once.
    pub fn start(&mut self) -> anyhow::Result<()> {
        let header_rx = self.header_rx.take().context("node already started")?;
        let block_rx = self.block_rx.take().context("node already started")?;
        let inbound_rx = self.inbound_rx.take().context("node already started")?;

        info!(
            aggregator = self.config.aggregator,
            lazy = self.config.lazy_aggregator,
            "starting full node"
        );

        {
            let sync_service = self.sync_service.clone();
            self.tasks
                .spawn(move |token| header_publish_loop(sync_service, header_rx, token));
        }
        {
            let sync_service = self.sync_service.clone();
            self.tasks
                .spawn(move |token| block_publish_loop(sync_service, block_rx, token));
        }

        if self.config.aggregator {
            info!(
                block_time_ms = self.config.block_manager.block_time_ms,
                "working in aggregator mode"
            );
            let lazy = self.config.lazy_aggregator;
            {
                let manager = self.manager.clone();
                let lifecycle = self.lifecycle.clone();
                self.tasks
                    .spawn(move |_| async move { manager.aggregation_loop(lifecycle, lazy).await });
            }
            {
                let manager = self.manager.clone();
                let lifecycle = self.lifecycle.clone();
                self.tasks
                    .spawn(move |_| async move { manager.submission_loop(lifecycle).await });
            }
        }

        {
            let manager = self.manager.clone();
            let lifecycle = self.lifecycle.clone();
            let inbound_tx = self.inbound_tx.clone();
            self.tasks.spawn(move |_| async move {
                manager.retrieval_loop(lifecycle, inbound_tx).await
            });
        }
        {
            let manager = self.manager.clone();
            let lifecycle = self.lifecycle.clone();
            self.tasks
                .spawn(move |_| async move { manager.apply_loop(lifecycle, inbound_rx).await });
        }
        Ok(())
    }

    /// Blocks until a termination signal arrives or a lifecycle loop hits a
    /// fatal invariant. Fatal halts are reported as an error so the process
    /// exits non-zero.
    pub async fn wait_shutdown(&mut self) -> anyhow::Result<()> {
        let lifecycle = self.lifecycle.clone();
        let fatal = select! {
            _ = lifecycle.cancelled() => true,
            _ = wait_termination_signal() => false,
        };
        self.tasks.abort().await;
        if fatal {
            bail!("node halted on a fatal lifecycle error");
        }
        Ok(())
    }

    /// Stops all lifecycle loops.
    pub async fn stop(&mut self) {
        self.tasks.abort().await;
    }

    /// Sender feeding gossiped blocks into the apply path.
    pub fn gossip_sender(&self) -> mpsc::Sender<Block> {
        self.inbound_tx.clone()
    }

    pub fn store(&self) -> &Arc<BlockStore<PrefixKv<K>>> {
        &self.store
    }

    pub fn manager(&self) -> &Arc<Manager<BlockStore<PrefixKv<K>>, D, E, M>> {
        &self.manager
    }
}

async fn header_publish_loop(
    sync_service: Arc<dyn SyncService>,
    mut header_rx: mpsc::Receiver<SignedHeader>,
    token: CancellationToken,
) {
    loop {
        select! {
            biased;
            _ = token.cancelled() => return,
            received = header_rx.recv() => {
                let Some(header) = received else { return };
                if let Err(e) = sync_service.broadcast_header(header).await {
                    error!(error = %e, "failed to broadcast header");
                    return;
                }
            }
        }
    }
}

async fn block_publish_loop(
    sync_service: Arc<dyn SyncService>,
    mut block_rx: mpsc::Receiver<Block>,
    token: CancellationToken,
) {
    loop {
        select! {
            biased;
            _ = token.cancelled() => return,
            received = block_rx.recv() => {
                let Some(block) = received else { return };
                if let Err(e) = sync_service.broadcast_block(block).await {
                    error!(error = %e, "failed to broadcast block");
                    return;
                }
            }
        }
    }
}
