//! The data availability boundary of the node.
//!
//! [`DataAvailability`] is the wire-agnostic capability set a DA layer has to
//! offer; [`DaClient`] turns a queue of rollup blocks into blob submissions
//! that fit the layer's blob-size limit and decodes retrieved blobs back into
//! blocks. [`DummyDa`] is a fully functional in-memory layer used by the mock
//! node mode and the test suite.
#![forbid(unsafe_code)]

mod client;
mod dummy;
pub mod mock;

use async_trait::async_trait;
use laminar_types::NamespaceId;
use thiserror::Error;

pub use client::{
    DaClient, RetrieveBlocksResult, StatusCode, SubmitBlocksResult, DEFAULT_SUBMIT_TIMEOUT,
};
pub use dummy::DummyDa;

/// Serialized bytes of a single rollup block as placed on DA.
pub type Blob = Vec<u8>;

/// Opaque identifier issued by the DA layer. The first 8 bytes are the
/// little-endian DA height the blob landed at; the remainder is
/// implementation specific.
pub type BlobId = Vec<u8>;

pub type BlobProof = Vec<u8>;

pub type BlobCommitment = Vec<u8>;

/// Decodes the DA height from the little-endian prefix of an ID.
pub fn da_height_from_id(id: &[u8]) -> Option<u64> {
    let prefix: [u8; 8] = id.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(prefix))
}

/// Encodes a DA height into the ID prefix.
pub fn id_prefix_from_da_height(da_height: u64) -> [u8; 8] {
    da_height.to_le_bytes()
}

#[derive(Debug, Error)]
pub enum DaError {
    #[error("blob: not found")]
    BlobNotFound,
    #[error("blob: over size limit")]
    BlobSizeOverLimit,
    #[error("given height {0} is from the future")]
    HeightFromFuture(u64),
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Capability set of a DA layer.
///
/// `submit` is atomic per call: either all blobs in the argument land at the
/// returned DA height or the call errors.
#[async_trait]
pub trait DataAvailability: Send + Sync + 'static {
    /// Largest cumulative blob size accepted in one `submit` call.
    async fn max_blob_size(&self) -> Result<u64, DaError>;

    async fn submit(
        &self,
        blobs: Vec<Blob>,
        gas_price: f64,
        namespace: NamespaceId,
    ) -> Result<(Vec<BlobId>, Vec<BlobProof>), DaError>;

    /// IDs of all blobs at the given DA height. Fails with
    /// [`DaError::HeightFromFuture`] when the height is beyond the layer's
    /// head, so callers can tell "empty height" from "not produced yet".
    async fn get_ids(&self, da_height: u64, namespace: NamespaceId)
        -> Result<Vec<BlobId>, DaError>;

    async fn get(&self, ids: &[BlobId], namespace: NamespaceId) -> Result<Vec<Blob>, DaError>;

    async fn commit(
        &self,
        blobs: &[Blob],
        namespace: NamespaceId,
    ) -> Result<Vec<BlobCommitment>, DaError>;

    async fn get_proofs(
        &self,
        ids: &[BlobId],
        namespace: NamespaceId,
    ) -> Result<Vec<BlobProof>, DaError>;

    async fn validate(
        &self,
        ids: &[BlobId],
        proofs: &[BlobProof],
        namespace: NamespaceId,
    ) -> Result<Vec<bool>, DaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_height_prefix_round_trip() {
        let mut id = id_prefix_from_da_height(0xdead_beef).to_vec();
        id.extend_from_slice(&[1, 2, 3]);
        assert_eq!(da_height_from_id(&id), Some(0xdead_beef));
    }

    #[test]
    fn short_ids_have_no_height() {
        assert_eq!(da_height_from_id(&[1, 2, 3]), None);
    }
}
