use borsh::{BorshDeserialize, BorshSerialize};
use rs_merkle::algorithms::Sha256 as MerkleSha256;
use rs_merkle::MerkleTree;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{Hash, NamespaceId, Tx};

/// Consensus rules version a block was produced under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Version {
    pub block: u64,
    pub app: u64,
}

/// Block header. Immutable once the block is created; the canonical header
/// hash is SHA-256 over the borsh encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Header {
    pub version: Version,
    /// Identifies the rollup this chain runs as on the shared DA layer.
    pub namespace_id: NamespaceId,
    pub height: u64,
    /// Block time in TAI64 format.
    pub time: u64,
    pub last_header_hash: Hash,
    /// Commit from the aggregator over the previous block.
    pub last_commit_hash: Hash,
    /// Merkle root of the block's transactions.
    pub data_hash: Hash,
    pub consensus_hash: Hash,
    /// App state root after applying the txs of the previous block.
    pub app_hash: Hash,
    /// Root of all tx results from the previous block.
    pub last_results_hash: Hash,
    pub proposer_address: Vec<u8>,
    /// Hash of the aggregator set at the time of block creation.
    pub aggregators_hash: Hash,
}

impl Header {
    /// Canonical header hash.
    pub fn hash(&self) -> Hash {
        let encoded = borsh::to_vec(self).expect("header encoding is infallible");
        Sha256::digest(&encoded).into()
    }
}

/// Block payload: transactions plus the auxiliary data needed for fraud
/// proofs and misbehavior handling.
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Data {
    pub txs: Vec<Tx>,
    pub intermediate_state_roots: Vec<Vec<u8>>,
    pub evidence: Vec<Vec<u8>>,
}

impl Data {
    /// Merkle root over the raw transactions. An empty tx list hashes to the
    /// all-zero root.
    pub fn hash(&self) -> Hash {
        if self.txs.is_empty() {
            return [0u8; 32];
        }
        let leaves: Vec<[u8; 32]> = self
            .txs
            .iter()
            .map(|tx| Sha256::digest(tx).into())
            .collect();
        MerkleTree::<MerkleSha256>::from_leaves(&leaves)
            .root()
            .unwrap_or([0u8; 32])
    }
}

/// Signature of a block creator over the header hash.
pub type Signature = Vec<u8>;

/// Evidence of block creation, carried in the *next* block and gossiped
/// alongside the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Commit {
    pub height: u64,
    pub header_hash: Hash,
    /// Most of the time a single aggregator signature.
    pub signatures: Vec<Signature>,
}

impl Commit {
    /// Checks that this commit attests to the given header.
    pub fn validate(&self, header: &Header) -> Result<(), BlockValidationError> {
        if self.height != header.height {
            return Err(BlockValidationError::CommitHeightMismatch {
                commit: self.height,
                header: header.height,
            });
        }
        if self.header_hash != header.hash() {
            return Err(BlockValidationError::CommitHashMismatch {
                height: header.height,
            });
        }
        if self.signatures.is_empty() {
            return Err(BlockValidationError::MissingSignature {
                height: header.height,
            });
        }
        Ok(())
    }

    /// Hash of the borsh-encoded commit, referenced by the next header.
    pub fn hash(&self) -> Hash {
        let encoded = borsh::to_vec(self).expect("commit encoding is infallible");
        Sha256::digest(&encoded).into()
    }
}

/// Header plus the commit over it. Used for light-client gossip.
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignedHeader {
    pub header: Header,
    pub commit: Commit,
}

impl SignedHeader {
    pub fn validate(&self) -> Result<(), BlockValidationError> {
        self.commit.validate(&self.header)
    }
}

/// A rollup block. The DA blob of a block is exactly its borsh encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub header: Header,
    pub data: Data,
    /// Commit over the previous block.
    pub last_commit: Commit,
}

impl Block {
    pub fn height(&self) -> u64 {
        self.header.height
    }

    /// Canonical block hash, defined as the header hash.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Canonical binary encoding; this is the blob placed on DA.
    pub fn encode(&self) -> anyhow::Result<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(borsh::from_slice(bytes)?)
    }

    /// Structural checks that do not require chain context.
    pub fn validate_basic(&self) -> Result<(), BlockValidationError> {
        if self.header.height == 0 {
            return Err(BlockValidationError::ZeroHeight);
        }
        if self.header.data_hash != self.data.hash() {
            return Err(BlockValidationError::DataHashMismatch {
                height: self.header.height,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockValidationError {
    #[error("block height must not be zero")]
    ZeroHeight,
    #[error("data hash does not match block data at height {height}")]
    DataHashMismatch { height: u64 },
    #[error("commit height {commit} does not match header height {header}")]
    CommitHeightMismatch { commit: u64, header: u64 },
    #[error("commit does not attest to header at height {height}")]
    CommitHashMismatch { height: u64 },
    #[error("commit at height {height} carries no signatures")]
    MissingSignature { height: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::random_block;

    #[test]
    fn header_hash_changes_with_contents() {
        let block = random_block(1, 3);
        let mut other = block.clone();
        other.header.app_hash[0] ^= 0xff;
        assert_ne!(block.header.hash(), other.header.hash());
    }

    #[test]
    fn block_encoding_round_trip() {
        let block = random_block(7, 5);
        let blob = block.encode().unwrap();
        let decoded = Block::decode(&blob).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn commit_validation_catches_mismatches() {
        let block = random_block(3, 1);
        let good = Commit {
            height: 3,
            header_hash: block.header.hash(),
            signatures: vec![vec![0u8; 64]],
        };
        assert!(good.validate(&block.header).is_ok());

        let wrong_height = Commit { height: 4, ..good.clone() };
        assert_eq!(
            wrong_height.validate(&block.header),
            Err(BlockValidationError::CommitHeightMismatch { commit: 4, header: 3 })
        );

        let wrong_hash = Commit { header_hash: [9u8; 32], ..good.clone() };
        assert_eq!(
            wrong_hash.validate(&block.header),
            Err(BlockValidationError::CommitHashMismatch { height: 3 })
        );

        let unsigned = Commit { signatures: vec![], ..good };
        assert_eq!(
            unsigned.validate(&block.header),
            Err(BlockValidationError::MissingSignature { height: 3 })
        );
    }

    #[test]
    fn empty_data_hashes_to_zero_root() {
        assert_eq!(Data::default().hash(), [0u8; 32]);
    }
}
