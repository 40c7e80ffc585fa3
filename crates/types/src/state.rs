use borsh::{BorshDeserialize, BorshSerialize};

use crate::Hash;

/// Snapshot of the chain state the lifecycle loops advance.
///
/// Persisted after every applied block; on restart the node resumes from the
/// stored snapshot. `da_height` is the retrieval cursor floor, unrelated to
/// the rollup height.
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct State {
    pub last_block_height: u64,
    pub last_block_hash: Hash,
    /// App state root after executing the block at `last_block_height`. The
    /// next header is created with this value, so header N carries the
    /// post-execution app hash of block N-1.
    pub app_hash: Hash,
    pub last_results_hash: Hash,
    /// Highest DA height that has been fully processed by retrieval.
    pub da_height: u64,
}

impl State {
    /// Initial state of a fresh chain.
    pub fn genesis(app_hash: Hash, da_start_height: u64) -> Self {
        State {
            last_block_height: 0,
            last_block_hash: [0u8; 32],
            app_hash,
            last_results_hash: [0u8; 32],
            da_height: da_start_height,
        }
    }

    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(borsh::from_slice(bytes)?)
    }
}
