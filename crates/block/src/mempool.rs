use std::collections::VecDeque;
use std::sync::Arc;

use laminar_types::Tx;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Narrow mempool contract the aggregation loop depends on. Admission policy
/// and gossip live with the mempool implementation, not here.
pub trait Mempool: Send + Sync + 'static {
    /// Takes up to `max_bytes` worth of transactions, oldest first. A single
    /// transaction larger than `max_bytes` is still returned alone so the
    /// chain keeps making progress.
    fn reap(&self, max_bytes: usize) -> Vec<Tx>;

    /// Signal fired when transactions become available; drives lazy
    /// aggregation.
    fn notify(&self) -> Arc<Notify>;
}

/// FIFO in-memory mempool used by the mock node mode and the test suite.
#[derive(Default)]
pub struct InMemoryMempool {
    txs: Mutex<VecDeque<Tx>>,
    notify: Arc<Notify>,
}

impl InMemoryMempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, tx: Tx) {
        self.txs.lock().push_back(tx);
        self.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.txs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.lock().is_empty()
    }
}

impl Mempool for InMemoryMempool {
    fn reap(&self, max_bytes: usize) -> Vec<Tx> {
        let mut txs = self.txs.lock();
        let mut out = vec![];
        let mut total = 0usize;
        while let Some(tx) = txs.front() {
            let len = tx.len();
            if !out.is_empty() && total + len > max_bytes {
                break;
            }
            if let Some(tx) = txs.pop_front() {
                total += len;
                out.push(tx);
            }
            if total >= max_bytes {
                break;
            }
        }
        out
    }

    fn notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }
}
