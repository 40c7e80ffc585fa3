use metrics::{Counter, Gauge, Histogram};
use metrics_derive::Metrics;
use once_cell::sync::Lazy;

/// Metrics collected by the block lifecycle loops.
#[derive(Metrics)]
#[metrics(scope = "block_manager")]
pub struct BlockManagerMetrics {
    #[metric(describe = "The current committed chain height")]
    pub chain_height: Gauge,
    #[metric(describe = "Height of the last block submitted to DA")]
    pub last_submitted_height: Gauge,
    #[metric(describe = "The DA height the retrieval cursor points at")]
    pub da_retrieval_height: Gauge,
    #[metric(describe = "An ever increasing count of applied blocks")]
    pub applied_blocks: Counter,
    #[metric(describe = "The duration of one DA submission round")]
    pub da_submission: Histogram,
}

pub static BLOCK_METRICS: Lazy<BlockManagerMetrics> = Lazy::new(|| {
    BlockManagerMetrics::describe();
    BlockManagerMetrics::default()
});
