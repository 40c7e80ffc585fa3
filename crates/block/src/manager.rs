use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::bail;
use backoff::future::retry as retry_backoff;
use backoff::ExponentialBackoffBuilder;
use ed25519_dalek::VerifyingKey;
use laminar_config::BlockManagerConfig;
use laminar_da::{DaClient, DataAvailability, RetrieveBlocksResult, StatusCode};
use laminar_store::Store;
use laminar_types::{Block, Commit, SignedHeader, State};
use parking_lot::Mutex;
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::executor::Executor;
use crate::mempool::Mempool;
use crate::metrics::BLOCK_METRICS;
use crate::pending_blocks::PendingBlocks;
use crate::signer::{verify_commit, ProposerKey};
use crate::SyncError;

/// Capacity of the header and block broadcast channels. Bounded so a slow
/// gossip subscriber backpressures the producer instead of growing memory.
pub const BROADCAST_CHANNEL_CAPACITY: usize = 100;

/// Upper bound on transaction bytes reaped into one block.
const MAX_REAP_BYTES: usize = 1024 * 1024;

/// Orchestrates the block lifecycle: aggregation, DA submission, DA
/// retrieval and apply. Each loop runs as its own task bound to one
/// cancellation token; durable cross-loop state lives in the store.
pub struct Manager<S, D, E, M> {
    store: Arc<S>,
    da_client: DaClient<D>,
    executor: E,
    mempool: Arc<M>,
    pending_blocks: PendingBlocks<S>,
    config: BlockManagerConfig,
    proposer: VerifyingKey,
    signer: Option<ProposerKey>,
    state: Mutex<State>,
    header_tx: mpsc::Sender<SignedHeader>,
    block_tx: mpsc::Sender<Block>,
}

impl<S, D, E, M> Manager<S, D, E, M>
where
    S: Store,
    D: DataAvailability,
    E: Executor,
    M: Mempool,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<S>,
        da_client: DaClient<D>,
        executor: E,
        mempool: Arc<M>,
        config: BlockManagerConfig,
        proposer: VerifyingKey,
        signer: Option<ProposerKey>,
        header_tx: mpsc::Sender<SignedHeader>,
        block_tx: mpsc::Sender<Block>,
    ) -> anyhow::Result<Self> {
        let state = match store.state()? {
            Some(state) => state,
            None => State::genesis([0u8; 32], config.da_start_height),
        };
        info!(
            height = state.last_block_height,
            da_height = state.da_height,
            "starting block manager"
        );

        Ok(Self {
            pending_blocks: PendingBlocks::new(store.clone()),
            store,
            da_client,
            executor,
            mempool,
            config,
            proposer,
            signer,
            state: Mutex::new(state),
            header_tx,
            block_tx,
        })
    }

    /// Snapshot of the current lifecycle state.
    pub fn state(&self) -> State {
        self.state.lock().clone()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn pending_blocks(&self) -> &PendingBlocks<S> {
        &self.pending_blocks
    }

    /// Produces blocks while the node runs in aggregator mode.
    ///
    /// Eager mode ticks every `block_time`; lazy mode waits for the mempool
    /// to signal transactions, with `lazy_block_time` as a heartbeat cap so
    /// the chain advances even when idle.
    pub async fn aggregation_loop(&self, token: CancellationToken, lazy: bool) {
        if self.signer.is_none() {
            error!("aggregation loop requires a proposer signing key");
            return;
        }
        if lazy {
            self.lazy_aggregation_loop(token).await
        } else {
            self.eager_aggregation_loop(token).await
        }
    }

    async fn eager_aggregation_loop(&self, token: CancellationToken) {
        let mut tick = tokio::time::interval(self.config.block_time());
        tick.tick().await;
        loop {
            select! {
                biased;
                _ = token.cancelled() => return,
                _ = tick.tick() => {
                    if let Err(e) = self.publish_block().await {
                        error!(error = %e, "failed to publish block");
                    }
                }
            }
        }
    }

    async fn lazy_aggregation_loop(&self, token: CancellationToken) {
        let notify = self.mempool.notify();
        let mut heartbeat = tokio::time::interval(self.config.lazy_block_time());
        heartbeat.tick().await;
        loop {
            select! {
                biased;
                _ = token.cancelled() => return,
                _ = notify.notified() => {
                    if let Err(e) = self.publish_block().await {
                        error!(error = %e, "failed to publish block");
                    }
                    heartbeat.reset();
                }
                _ = heartbeat.tick() => {
                    if let Err(e) = self.publish_block().await {
                        error!(error = %e, "failed to publish heartbeat block");
                    }
                }
            }
        }
    }

    async fn publish_block(&self) -> anyhow::Result<()> {
        let Some(signer) = self.signer.as_ref() else {
            bail!("no proposer signing key configured");
        };

        let height = self.store.height() + 1;
        let last_commit = if height == 1 {
            // zero commit for the first block; there is nothing to attest to
            Commit::default()
        } else {
            self.store.get_commit(height - 1)?
        };

        let state = self.state.lock().clone();
        let txs = self.mempool.reap(MAX_REAP_BYTES);
        let block = self
            .executor
            .create_block(height, &last_commit, &state, txs);
        block.validate_basic()?;

        let (mut new_state, responses) = self.executor.apply_block(&state, &block)?;

        let commit = Commit {
            height,
            header_hash: block.header.hash(),
            signatures: vec![signer.sign_header(&block.header)],
        };
        // a block is visible only once both block and commit are durable
        self.store.put_block(&block, &commit)?;

        let (app_hash, _retain_height) = self.executor.commit(&new_state, &block, &responses)?;
        new_state.app_hash = app_hash;
        self.store.update_state(&new_state)?;
        *self.state.lock() = new_state;

        BLOCK_METRICS.chain_height.set(height as f64);
        info!(height, txs = block.data.txs.len(), "produced block");

        let signed_header = SignedHeader {
            header: block.header.clone(),
            commit,
        };
        if self.header_tx.send(signed_header).await.is_err() {
            bail!("header broadcast channel closed");
        }
        if self.block_tx.send(block).await.is_err() {
            bail!("block broadcast channel closed");
        }
        Ok(())
    }

    /// Pushes locally committed blocks to DA. The periodic tick is the retry
    /// policy: nothing is acknowledged on failure, partial submissions are
    /// persisted progress and the remainder goes out on the next round.
    pub async fn submission_loop(&self, token: CancellationToken) {
        let mut tick = tokio::time::interval(self.config.da_block_time());
        tick.tick().await;
        loop {
            select! {
                biased;
                _ = token.cancelled() => return,
                _ = tick.tick() => self.submit_pending_to_da(&token).await,
            }
        }
    }

    async fn submit_pending_to_da(&self, token: &CancellationToken) {
        loop {
            let (pending, err) = self.pending_blocks.pending();
            if let Some(e) = err {
                warn!(error = %e, "could not read all blocks pending DA submission");
            }
            if pending.is_empty() {
                return;
            }

            let start = Instant::now();
            // in-flight submissions are dropped on cancellation
            let res = select! {
                biased;
                _ = token.cancelled() => return,
                res = self.da_client.submit_blocks(&pending) => res,
            };
            BLOCK_METRICS
                .da_submission
                .record(start.elapsed().as_secs_f64());

            match res.code {
                StatusCode::Success => {
                    let submitted = res.submitted_count as usize;
                    if submitted == 0 {
                        return;
                    }
                    let up_to = pending[submitted - 1].height();
                    self.pending_blocks.mark_submitted(up_to);
                    BLOCK_METRICS.last_submitted_height.set(up_to as f64);
                    info!(
                        da_height = res.da_height,
                        up_to, submitted, "submitted blocks to DA"
                    );
                    if submitted < pending.len() {
                        // the cut-off remainder goes out right away
                        continue;
                    }
                    return;
                }
                StatusCode::NotFound | StatusCode::Error => {
                    warn!(message = %res.message, "DA submission failed, retrying on next tick");
                    return;
                }
            }
        }
    }

    /// Polls DA heights and feeds retrieved blocks into the apply loop.
    ///
    /// The cursor starts at `max(da_start_height, state.da_height)` and
    /// never skips a DA height with content: it only advances past heights
    /// the DA confirmed (with or without blobs), and waits whenever the
    /// cursor reaches the DA head.
    pub async fn retrieval_loop(&self, token: CancellationToken, inbound: mpsc::Sender<Block>) {
        let mut da_height = {
            let state = self.state.lock();
            self.config.da_start_height.max(state.da_height)
        };
        let mut tick = tokio::time::interval(self.config.da_block_time());
        tick.tick().await;

        loop {
            select! {
                biased;
                _ = token.cancelled() => return,
                _ = tick.tick() => {}
            }

            // drain every DA height that is already available
            loop {
                let res = select! {
                    biased;
                    _ = token.cancelled() => return,
                    res = self.retrieve_with_backoff(da_height) => res,
                };
                match res.code {
                    StatusCode::Success => {
                        debug!(da_height, blocks = res.blocks.len(), "retrieved blocks from DA");
                        for block in res.blocks {
                            match self.screen_retrieved_block(&block) {
                                Ok(true) => {
                                    if inbound.send(block).await.is_err() {
                                        return;
                                    }
                                }
                                Ok(false) => {} // known duplicate, dropped
                                Err(e @ SyncError::Fatal { .. }) => {
                                    error!(error = %e, "fatal divergence on DA retrieval, stopping node");
                                    token.cancel();
                                    return;
                                }
                                Err(SyncError::Transient(e)) => {
                                    // could not compare against the store; let
                                    // the apply loop screen it again
                                    warn!(error = %e, "could not screen retrieved block");
                                    if inbound.send(block).await.is_err() {
                                        return;
                                    }
                                }
                            }
                        }
                        da_height += 1;
                        self.advance_da_cursor(da_height);
                    }
                    StatusCode::NotFound => {
                        // the height exists on DA but carries nothing for us
                        debug!(da_height, "no blobs at DA height");
                        da_height += 1;
                        self.advance_da_cursor(da_height);
                    }
                    StatusCode::Error => {
                        if res.message.contains("from the future") {
                            debug!(da_height, "caught up with DA head");
                        } else {
                            warn!(message = %res.message, "DA retrieval failed, retrying on next tick");
                        }
                        break;
                    }
                }
            }
        }
    }

    /// Retries transient retrieval errors with exponential backoff, bounded
    /// well below the tick period so a dead DA endpoint degrades into the
    /// regular tick cadence.
    async fn retrieve_with_backoff(&self, da_height: u64) -> RetrieveBlocksResult {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.da_block_time() / 16)
            .with_max_elapsed_time(Some(self.config.da_block_time() / 2))
            .build();

        retry_backoff(backoff, || async {
            let res = self.da_client.retrieve_blocks(da_height).await;
            if res.code == StatusCode::Error && !res.message.contains("from the future") {
                debug!(da_height, message = %res.message, "transient DA retrieval error");
                return Err(backoff::Error::transient(res));
            }
            Ok(res)
        })
        .await
        .unwrap_or_else(|res| res)
    }

    fn advance_da_cursor(&self, da_height: u64) {
        let mut state = self.state.lock();
        if da_height > state.da_height {
            state.da_height = da_height;
        }
        BLOCK_METRICS.da_retrieval_height.set(da_height as f64);
    }

    /// Decides whether a retrieved block enters the apply path. Duplicates of
    /// already applied blocks are dropped silently; a differing block at an
    /// applied height is a fork.
    fn screen_retrieved_block(&self, block: &Block) -> Result<bool, SyncError> {
        let height = block.height();
        if height == 0 {
            return Ok(false);
        }
        if height <= self.store.height() {
            let applied = self
                .store
                .get_block(height)
                .map_err(anyhow::Error::from)?;
            if applied == *block {
                return Ok(false);
            }
            return Err(SyncError::fatal(
                height,
                "block retrieved from DA differs from the applied block",
            ));
        }
        Ok(true)
    }

    /// Applies blocks from DA retrieval and gossip in strict height order.
    ///
    /// Out-of-order arrivals are parked in a pending map keyed by height;
    /// gaps block the apply until the missing height shows up. The commit
    /// over block N travels in block N+1's `last_commit`, so N is applied
    /// once N+1 is known.
    pub async fn apply_loop(&self, token: CancellationToken, mut inbound: mpsc::Receiver<Block>) {
        let mut pending: HashMap<u64, Block> = HashMap::new();
        loop {
            select! {
                biased;
                _ = token.cancelled() => return,
                received = inbound.recv() => {
                    let Some(block) = received else { return };
                    match self.queue_block(&mut pending, block) {
                        Ok(()) => {}
                        Err(e @ SyncError::Fatal { .. }) => {
                            error!(error = %e, "fatal divergence in apply queue, stopping node");
                            token.cancel();
                            return;
                        }
                        Err(SyncError::Transient(e)) => {
                            warn!(error = %e, "failed to queue block, dropping; it will be re-fetched");
                        }
                    }
                    loop {
                        match self.try_apply_next(&mut pending).await {
                            Ok(true) => continue,
                            Ok(false) => break,
                            Err(e @ SyncError::Fatal { .. }) => {
                                error!(error = %e, "stopping node");
                                token.cancel();
                                return;
                            }
                            Err(SyncError::Transient(e)) => {
                                warn!(error = %e, "failed to apply block, will retry");
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    fn queue_block(
        &self,
        pending: &mut HashMap<u64, Block>,
        block: Block,
    ) -> Result<(), SyncError> {
        let height = block.height();
        if height <= self.store.height() {
            let applied = self
                .store
                .get_block(height)
                .map_err(anyhow::Error::from)?;
            if applied != block {
                return Err(SyncError::fatal(
                    height,
                    "duplicate block differs from the applied block",
                ));
            }
            return Ok(());
        }
        match pending.get(&height) {
            // first accepted block wins; copies must be byte-identical
            Some(existing) if *existing != block => Err(SyncError::fatal(
                height,
                "conflicting blocks received for the same height",
            )),
            Some(_) => Ok(()),
            None => {
                pending.insert(height, block);
                Ok(())
            }
        }
    }

    async fn try_apply_next(&self, pending: &mut HashMap<u64, Block>) -> Result<bool, SyncError> {
        let next = self.store.height() + 1;
        let Some(block) = pending.get(&next) else {
            return Ok(false);
        };
        // the commit over block N is carried by block N+1
        let Some(successor) = pending.get(&(next + 1)) else {
            return Ok(false);
        };
        let commit = successor.last_commit.clone();
        let block = block.clone();
        self.apply_block(&block, &commit).await?;
        pending.remove(&next);
        Ok(true)
    }

    async fn apply_block(&self, block: &Block, commit: &Commit) -> Result<(), SyncError> {
        let height = block.height();
        block
            .validate_basic()
            .map_err(|e| SyncError::fatal(height, e.to_string()))?;
        commit
            .validate(&block.header)
            .map_err(|e| SyncError::fatal(height, e.to_string()))?;
        verify_commit(commit, &block.header, &self.proposer)
            .map_err(|e| SyncError::fatal(height, e.to_string()))?;
        if height > 1 {
            let prev = self
                .store
                .get_block(height - 1)
                .map_err(anyhow::Error::from)?;
            block.last_commit.validate(&prev.header).map_err(|e| {
                SyncError::fatal(height, format!("last commit does not match block {}: {e}", height - 1))
            })?;
        }

        let state = self.state.lock().clone();
        let (mut new_state, responses) = self
            .executor
            .apply_block(&state, block)
            .map_err(|e| SyncError::fatal(height, e.to_string()))?;
        self.store
            .put_block(block, commit)
            .map_err(anyhow::Error::from)?;
        let (app_hash, _retain_height) = self
            .executor
            .commit(&new_state, block, &responses)
            .map_err(|e| SyncError::fatal(height, e.to_string()))?;
        new_state.app_hash = app_hash;

        // keep the retrieval cursor if it ran ahead of this snapshot
        let da_cursor = self.state.lock().da_height;
        new_state.da_height = new_state.da_height.max(da_cursor);
        self.store
            .update_state(&new_state)
            .map_err(anyhow::Error::from)?;
        *self.state.lock() = new_state;

        BLOCK_METRICS.chain_height.set(height as f64);
        BLOCK_METRICS.applied_blocks.increment(1);
        debug!(height, "applied block");

        // fan the applied block out to gossip; sends only fail while the
        // shell is shutting down
        let signed_header = SignedHeader {
            header: block.header.clone(),
            commit: commit.clone(),
        };
        let _ = self.header_tx.send(signed_header).await;
        let _ = self.block_tx.send(block.clone()).await;
        Ok(())
    }
}
