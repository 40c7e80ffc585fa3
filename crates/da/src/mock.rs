//! Programmable DA test double.

use std::time::Duration;

use async_trait::async_trait;
use laminar_types::NamespaceId;
use parking_lot::Mutex;

use crate::{Blob, BlobCommitment, BlobId, BlobProof, DaError, DataAvailability, DummyDa};

/// Wraps a [`DummyDa`] with failure and latency injection so tests can drive
/// the error paths of the client and the submission loop.
pub struct MockDa {
    inner: DummyDa,
    max_blob_size_error: Mutex<Option<String>>,
    submit_delay: Mutex<Option<Duration>>,
    submit_error: Mutex<Option<String>>,
}

impl MockDa {
    pub fn new(block_time: Duration) -> Self {
        Self {
            inner: DummyDa::new(block_time),
            max_blob_size_error: Mutex::new(None),
            submit_delay: Mutex::new(None),
            submit_error: Mutex::new(None),
        }
    }

    /// Makes `max_blob_size` fail with the given message.
    pub fn fail_max_blob_size(&self, message: &str) {
        *self.max_blob_size_error.lock() = Some(message.to_string());
    }

    /// Delays every `submit` call, e.g. to trip the submission timeout.
    pub fn delay_submit(&self, delay: Duration) {
        *self.submit_delay.lock() = Some(delay);
    }

    /// Makes `submit` fail with the given message; blobs are not stored.
    pub fn fail_submit(&self, message: &str) {
        *self.submit_error.lock() = Some(message.to_string());
    }

    /// Clears all injected failures and delays.
    pub fn heal(&self) {
        *self.max_blob_size_error.lock() = None;
        *self.submit_delay.lock() = None;
        *self.submit_error.lock() = None;
    }
}

#[async_trait]
impl DataAvailability for MockDa {
    async fn max_blob_size(&self) -> Result<u64, DaError> {
        if let Some(message) = self.max_blob_size_error.lock().clone() {
            return Err(DaError::Other(anyhow::anyhow!(message)));
        }
        self.inner.max_blob_size().await
    }

    async fn submit(
        &self,
        blobs: Vec<Blob>,
        gas_price: f64,
        namespace: NamespaceId,
    ) -> Result<(Vec<BlobId>, Vec<BlobProof>), DaError> {
        let delay = *self.submit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = self.submit_error.lock().clone() {
            return Err(DaError::Other(anyhow::anyhow!(message)));
        }
        self.inner.submit(blobs, gas_price, namespace).await
    }

    async fn get_ids(
        &self,
        da_height: u64,
        namespace: NamespaceId,
    ) -> Result<Vec<BlobId>, DaError> {
        self.inner.get_ids(da_height, namespace).await
    }

    async fn get(&self, ids: &[BlobId], namespace: NamespaceId) -> Result<Vec<Blob>, DaError> {
        self.inner.get(ids, namespace).await
    }

    async fn commit(
        &self,
        blobs: &[Blob],
        namespace: NamespaceId,
    ) -> Result<Vec<BlobCommitment>, DaError> {
        self.inner.commit(blobs, namespace).await
    }

    async fn get_proofs(
        &self,
        ids: &[BlobId],
        namespace: NamespaceId,
    ) -> Result<Vec<BlobProof>, DaError> {
        self.inner.get_proofs(ids, namespace).await
    }

    async fn validate(
        &self,
        ids: &[BlobId],
        proofs: &[BlobProof],
        namespace: NamespaceId,
    ) -> Result<Vec<bool>, DaError> {
        self.inner.validate(ids, proofs, namespace).await
    }
}
