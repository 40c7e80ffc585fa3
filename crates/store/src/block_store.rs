use std::sync::atomic::{AtomicU64, Ordering};

use laminar_types::{Block, Commit, State};
use thiserror::Error;

use crate::{BatchOp, KvStore};

const BLOCK_PREFIX: &str = "block";
const COMMIT_PREFIX: &str = "commit";
const STATE_KEY: &[u8] = b"state";
const META_PREFIX: &str = "meta";
const HEIGHT_META_KEY: &str = "height";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("block at height {0} not found")]
    BlockNotFound(u64),
    #[error("commit at height {0} not found")]
    CommitNotFound(u64),
    #[error("commit height {commit} does not match block height {block}")]
    CommitMismatch { block: u64, commit: u64 },
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Capability set offered to the block lifecycle.
///
/// Writes for a given height are transactional: a block becomes visible only
/// after both the block and its commit are durable.
pub trait Store: Send + Sync + 'static {
    /// Atomically persists a block together with its commit and advances the
    /// committed height.
    fn put_block(&self, block: &Block, commit: &Commit) -> Result<(), StoreError>;

    fn get_block(&self, height: u64) -> Result<Block, StoreError>;

    fn get_commit(&self, height: u64) -> Result<Commit, StoreError>;

    /// Highest committed block height; 0 for an empty chain.
    fn height(&self) -> u64;

    fn update_state(&self, state: &State) -> Result<(), StoreError>;

    fn state(&self) -> Result<Option<State>, StoreError>;

    fn set_metadata(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Height-indexed block storage over any [`KvStore`] backend.
///
/// The committed height is cached in an atomic and mirrored under a metadata
/// key inside the same write batch as the block, so `height()` survives
/// restarts without scanning.
pub struct BlockStore<K> {
    kv: K,
    height: AtomicU64,
}

impl<K: KvStore> BlockStore<K> {
    pub fn new(kv: K) -> Result<Self, StoreError> {
        let height = match kv.get(meta_key(HEIGHT_META_KEY).as_bytes())? {
            Some(raw) => parse_ascii_u64(&raw)?,
            None => 0,
        };
        Ok(Self {
            kv,
            height: AtomicU64::new(height),
        })
    }
}

fn block_key(height: u64) -> String {
    format!("{BLOCK_PREFIX}/{height}")
}

fn commit_key(height: u64) -> String {
    format!("{COMMIT_PREFIX}/{height}")
}

fn meta_key(key: &str) -> String {
    format!("{META_PREFIX}/{key}")
}

fn parse_ascii_u64(raw: &[u8]) -> Result<u64, StoreError> {
    let s = std::str::from_utf8(raw).map_err(anyhow::Error::from)?;
    Ok(s.parse::<u64>().map_err(anyhow::Error::from)?)
}

impl<K: KvStore> Store for BlockStore<K> {
    fn put_block(&self, block: &Block, commit: &Commit) -> Result<(), StoreError> {
        let height = block.height();
        if commit.height != height {
            return Err(StoreError::CommitMismatch {
                block: height,
                commit: commit.height,
            });
        }

        let new_height = self.height.load(Ordering::Acquire).max(height);
        self.kv.write_batch(vec![
            BatchOp::Put {
                key: block_key(height).into_bytes(),
                value: block.encode()?,
            },
            BatchOp::Put {
                key: commit_key(height).into_bytes(),
                value: borsh::to_vec(commit).map_err(anyhow::Error::from)?,
            },
            BatchOp::Put {
                key: meta_key(HEIGHT_META_KEY).into_bytes(),
                value: new_height.to_string().into_bytes(),
            },
        ])?;
        self.height.fetch_max(height, Ordering::AcqRel);
        Ok(())
    }

    fn get_block(&self, height: u64) -> Result<Block, StoreError> {
        let raw = self
            .kv
            .get(block_key(height).as_bytes())?
            .ok_or(StoreError::BlockNotFound(height))?;
        Ok(Block::decode(&raw)?)
    }

    fn get_commit(&self, height: u64) -> Result<Commit, StoreError> {
        let raw = self
            .kv
            .get(commit_key(height).as_bytes())?
            .ok_or(StoreError::CommitNotFound(height))?;
        Ok(borsh::from_slice(&raw).map_err(anyhow::Error::from)?)
    }

    fn height(&self) -> u64 {
        self.height.load(Ordering::Acquire)
    }

    fn update_state(&self, state: &State) -> Result<(), StoreError> {
        self.kv.put(STATE_KEY, &state.encode()?)?;
        Ok(())
    }

    fn state(&self) -> Result<Option<State>, StoreError> {
        match self.kv.get(STATE_KEY)? {
            Some(raw) => Ok(Some(State::decode(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_metadata(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.kv.put(meta_key(key).as_bytes(), value)?;
        Ok(())
    }

    fn get_metadata(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.kv.get(meta_key(key).as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use laminar_types::test_utils::random_block;
    use laminar_types::Commit;

    use super::*;
    use crate::{InMemoryKv, PrefixKv};

    fn commit_for(block: &Block) -> Commit {
        Commit {
            height: block.height(),
            header_hash: block.hash(),
            signatures: vec![vec![0u8; 64]],
        }
    }

    #[test]
    fn put_get_round_trip() {
        let store = BlockStore::new(InMemoryKv::new()).unwrap();
        let block = random_block(1, 4);
        let commit = commit_for(&block);

        store.put_block(&block, &commit).unwrap();

        assert_eq!(store.height(), 1);
        assert_eq!(store.get_block(1).unwrap(), block);
        assert_eq!(store.get_commit(1).unwrap(), commit);
    }

    #[test]
    fn rejects_mismatched_commit() {
        let store = BlockStore::new(InMemoryKv::new()).unwrap();
        let block = random_block(2, 0);
        let mut commit = commit_for(&block);
        commit.height = 3;

        assert!(matches!(
            store.put_block(&block, &commit),
            Err(StoreError::CommitMismatch { block: 2, commit: 3 })
        ));
        assert_eq!(store.height(), 0);
    }

    #[test]
    fn missing_heights_are_not_found() {
        let store = BlockStore::new(InMemoryKv::new()).unwrap();
        assert!(matches!(
            store.get_block(5),
            Err(StoreError::BlockNotFound(5))
        ));
        assert!(matches!(
            store.get_commit(5),
            Err(StoreError::CommitNotFound(5))
        ));
    }

    #[test]
    fn height_survives_reopen() {
        let base = Arc::new(InMemoryKv::new());
        {
            let store = BlockStore::new(PrefixKv::new(base.clone(), "0")).unwrap();
            for h in 1..=3 {
                let block = random_block(h, 1);
                store.put_block(&block, &commit_for(&block)).unwrap();
            }
            assert_eq!(store.height(), 3);
        }

        let reopened = BlockStore::new(PrefixKv::new(base, "0")).unwrap();
        assert_eq!(reopened.height(), 3);
        assert_eq!(reopened.get_block(2).unwrap().height(), 2);
    }

    #[test]
    fn state_and_metadata_round_trip() {
        let store = BlockStore::new(InMemoryKv::new()).unwrap();
        assert!(store.state().unwrap().is_none());

        let state = laminar_types::test_utils::random_genesis_state();
        store.update_state(&state).unwrap();
        assert_eq!(store.state().unwrap(), Some(state));

        assert_eq!(store.get_metadata("last submitted").unwrap(), None);
        store.set_metadata("last submitted", b"17").unwrap();
        assert_eq!(
            store.get_metadata("last submitted").unwrap(),
            Some(b"17".to_vec())
        );
    }
}
