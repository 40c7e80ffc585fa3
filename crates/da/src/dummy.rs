use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use laminar_types::NamespaceId;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::{
    da_height_from_id, id_prefix_from_da_height, Blob, BlobCommitment, BlobId, BlobProof, DaError,
    DataAvailability,
};

const DEFAULT_MAX_BLOB_SIZE: u64 = 64 * 1024;

#[derive(Default)]
struct DummyInner {
    /// Blobs per DA height, in submission order.
    heights: HashMap<u64, Vec<(BlobId, Blob)>>,
    sequence: u64,
}

/// In-memory DA layer.
///
/// Heights derive from elapsed wall-clock time paced by `block_time`, so
/// consecutive submissions can land at the same DA height just like on a real
/// layer. IDs are the little-endian height followed by a little-endian
/// sequence number.
pub struct DummyDa {
    max_blob_size: u64,
    block_time: Duration,
    started: Instant,
    inner: Mutex<DummyInner>,
}

impl DummyDa {
    pub fn new(block_time: Duration) -> Self {
        Self::with_max_blob_size(block_time, DEFAULT_MAX_BLOB_SIZE)
    }

    pub fn with_max_blob_size(block_time: Duration, max_blob_size: u64) -> Self {
        Self {
            max_blob_size,
            block_time,
            started: Instant::now(),
            inner: Mutex::new(DummyInner::default()),
        }
    }

    /// Current head height of the layer. Height 1 is available immediately.
    pub fn head_height(&self) -> u64 {
        let elapsed = self.started.elapsed().as_nanos();
        let block_time = self.block_time.as_nanos().max(1);
        (elapsed / block_time) as u64 + 1
    }

    fn proof_for(blob: &Blob) -> BlobProof {
        Sha256::digest(blob).to_vec()
    }
}

#[async_trait]
impl DataAvailability for DummyDa {
    async fn max_blob_size(&self) -> Result<u64, DaError> {
        Ok(self.max_blob_size)
    }

    async fn submit(
        &self,
        blobs: Vec<Blob>,
        _gas_price: f64,
        _namespace: NamespaceId,
    ) -> Result<(Vec<BlobId>, Vec<BlobProof>), DaError> {
        let total: u64 = blobs.iter().map(|b| b.len() as u64).sum();
        if total > self.max_blob_size {
            return Err(DaError::BlobSizeOverLimit);
        }

        let da_height = self.head_height();
        let mut inner = self.inner.lock();
        let mut ids = Vec::with_capacity(blobs.len());
        let mut proofs = Vec::with_capacity(blobs.len());
        for blob in blobs {
            let sequence = inner.sequence;
            inner.sequence += 1;

            let mut id = id_prefix_from_da_height(da_height).to_vec();
            id.extend_from_slice(&sequence.to_le_bytes());
            proofs.push(Self::proof_for(&blob));
            inner
                .heights
                .entry(da_height)
                .or_default()
                .push((id.clone(), blob));
            ids.push(id);
        }
        Ok((ids, proofs))
    }

    async fn get_ids(
        &self,
        da_height: u64,
        _namespace: NamespaceId,
    ) -> Result<Vec<BlobId>, DaError> {
        if da_height > self.head_height() {
            return Err(DaError::HeightFromFuture(da_height));
        }
        let inner = self.inner.lock();
        Ok(inner
            .heights
            .get(&da_height)
            .map(|entries| entries.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default())
    }

    async fn get(&self, ids: &[BlobId], _namespace: NamespaceId) -> Result<Vec<Blob>, DaError> {
        let inner = self.inner.lock();
        let mut blobs = Vec::with_capacity(ids.len());
        for id in ids {
            let da_height = da_height_from_id(id).ok_or(DaError::BlobNotFound)?;
            let blob = inner
                .heights
                .get(&da_height)
                .and_then(|entries| entries.iter().find(|(eid, _)| eid == id))
                .map(|(_, blob)| blob.clone())
                .ok_or(DaError::BlobNotFound)?;
            blobs.push(blob);
        }
        Ok(blobs)
    }

    async fn commit(
        &self,
        blobs: &[Blob],
        _namespace: NamespaceId,
    ) -> Result<Vec<BlobCommitment>, DaError> {
        Ok(blobs.iter().map(Self::proof_for).collect())
    }

    async fn get_proofs(
        &self,
        ids: &[BlobId],
        namespace: NamespaceId,
    ) -> Result<Vec<BlobProof>, DaError> {
        let blobs = self.get(ids, namespace).await?;
        Ok(blobs.iter().map(Self::proof_for).collect())
    }

    async fn validate(
        &self,
        ids: &[BlobId],
        proofs: &[BlobProof],
        namespace: NamespaceId,
    ) -> Result<Vec<bool>, DaError> {
        let blobs = self.get(ids, namespace).await?;
        Ok(blobs
            .iter()
            .zip(proofs)
            .map(|(blob, proof)| &Self::proof_for(blob) == proof)
            .collect())
    }
}
