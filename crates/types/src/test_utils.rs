//! Helpers for constructing blocks in tests and benchmarks.

use rand::RngCore;

use crate::{Block, Commit, Data, Header, NamespaceId, State, Version};

/// Builds a block at the given height with `n_txs` random 8..256 byte txs.
///
/// The block is structurally valid (`validate_basic` passes) but carries no
/// real signatures and is not linked to any predecessor.
pub fn random_block(height: u64, n_txs: usize) -> Block {
    let mut rng = rand::thread_rng();
    let txs = (0..n_txs)
        .map(|_| {
            let mut tx = vec![0u8; 8 + (rng.next_u32() as usize % 248)];
            rng.fill_bytes(&mut tx);
            tx
        })
        .collect();
    let data = Data {
        txs,
        intermediate_state_roots: vec![],
        evidence: vec![],
    };

    let mut header = Header {
        version: Version { block: 1, app: 1 },
        namespace_id: NamespaceId([1, 2, 3, 4, 5, 6, 7, 8]),
        height,
        time: crate::time::from_unix(1_700_000_000 + height),
        data_hash: data.hash(),
        proposer_address: vec![0xaa; 20],
        ..Default::default()
    };
    rng.fill_bytes(&mut header.app_hash);

    let last_commit = Commit {
        height: height.saturating_sub(1),
        header_hash: [0u8; 32],
        signatures: vec![vec![0u8; 64]],
    };

    Block {
        header,
        data,
        last_commit,
    }
}

/// Builds a block whose serialized blob is at least `min_blob_size` bytes.
pub fn random_block_with_min_size(height: u64, min_blob_size: usize) -> Block {
    let mut block = random_block(height, 0);
    let mut rng = rand::thread_rng();
    let mut tx = vec![0u8; min_blob_size];
    rng.fill_bytes(&mut tx);
    block.data.txs = vec![tx];
    block.header.data_hash = block.data.hash();
    block
}

/// Genesis state with a random app hash, starting DA retrieval at height 1.
pub fn random_genesis_state() -> State {
    let mut app_hash = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut app_hash);
    State::genesis(app_hash, 1)
}
