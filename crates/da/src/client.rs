use std::sync::Arc;
use std::time::Duration;

use laminar_types::{Block, NamespaceId};
use tracing::warn;

use crate::{da_height_from_id, Blob, DaError, DataAvailability};

/// Bounds a single DA submission RPC.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Result codes shared by submission and retrieval envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0,
    NotFound = 1,
    Error = 2,
}

/// Outcome of a [`DaClient::submit_blocks`] call.
#[derive(Debug)]
pub struct SubmitBlocksResult {
    pub code: StatusCode,
    pub message: String,
    /// DA height the batch landed at, decoded from the first returned ID.
    pub da_height: u64,
    /// How many blocks of the input made it into this submission. Anything
    /// beyond is left for the caller to retry.
    pub submitted_count: u64,
}

impl SubmitBlocksResult {
    fn error(message: String) -> Self {
        Self {
            code: StatusCode::Error,
            message,
            da_height: 0,
            submitted_count: 0,
        }
    }
}

/// Outcome of a [`DaClient::retrieve_blocks`] call.
#[derive(Debug)]
pub struct RetrieveBlocksResult {
    pub code: StatusCode,
    pub message: String,
    pub da_height: u64,
    pub blocks: Vec<Block>,
}

impl RetrieveBlocksResult {
    fn error(da_height: u64, message: String) -> Self {
        Self {
            code: StatusCode::Error,
            message,
            da_height,
            blocks: vec![],
        }
    }
}

/// Batching adapter between the block lifecycle and a [`DataAvailability`]
/// implementation.
///
/// Submission packs serialized blocks greedily, in input order, into a batch
/// that fits the layer's max blob size; blocks past the cut point are not
/// submitted and the partial count is reported back for retry.
pub struct DaClient<D> {
    da: Arc<D>,
    gas_price: f64,
    namespace: NamespaceId,
    submit_timeout: Duration,
}

impl<D: DataAvailability> DaClient<D> {
    pub fn new(da: Arc<D>, gas_price: f64, namespace: NamespaceId) -> Self {
        Self {
            da,
            gas_price,
            namespace,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Access to the wrapped DA layer, mainly for tests probing limits.
    pub fn da(&self) -> &Arc<D> {
        &self.da
    }

    pub async fn submit_blocks(&self, blocks: &[Block]) -> SubmitBlocksResult {
        let max_blob_size = match self.da.max_blob_size().await {
            Ok(size) => size,
            Err(e) => {
                return SubmitBlocksResult::error(format!(
                    "unable to get DA max blob size: {e}"
                ));
            }
        };

        let mut blobs = Vec::with_capacity(blocks.len());
        for block in blocks {
            let blob = match block.encode() {
                Ok(blob) => blob,
                Err(e) => {
                    return SubmitBlocksResult::error(format!(
                        "failed to serialize block at height {}: {e}",
                        block.height()
                    ));
                }
            };
            if blob.len() as u64 > max_blob_size {
                return SubmitBlocksResult::error(format!(
                    "failed to submit blocks: oversized block: {}",
                    DaError::BlobSizeOverLimit
                ));
            }
            blobs.push(blob);
        }

        let cut = batch_cut_point(&blobs, max_blob_size);
        if cut == 0 {
            return SubmitBlocksResult {
                code: StatusCode::Success,
                message: String::new(),
                da_height: 0,
                submitted_count: 0,
            };
        }
        let batch: Vec<Blob> = blobs[..cut].to_vec();

        let submitted = tokio::time::timeout(
            self.submit_timeout,
            self.da.submit(batch, self.gas_price, self.namespace),
        )
        .await;

        match submitted {
            Err(_elapsed) => SubmitBlocksResult::error(format!(
                "failed to submit blocks: {}",
                DaError::DeadlineExceeded
            )),
            Ok(Err(e)) => SubmitBlocksResult::error(format!("failed to submit blocks: {e}")),
            Ok(Ok((ids, _proofs))) => {
                let Some(da_height) = ids.first().and_then(|id| da_height_from_id(id)) else {
                    return SubmitBlocksResult::error(
                        "failed to submit blocks: DA returned no valid IDs".to_string(),
                    );
                };
                SubmitBlocksResult {
                    code: StatusCode::Success,
                    message: String::new(),
                    da_height,
                    submitted_count: cut as u64,
                }
            }
        }
    }

    pub async fn retrieve_blocks(&self, da_height: u64) -> RetrieveBlocksResult {
        let ids = match self.da.get_ids(da_height, self.namespace).await {
            Ok(ids) => ids,
            Err(DaError::BlobNotFound) => {
                return RetrieveBlocksResult {
                    code: StatusCode::NotFound,
                    message: format!("failed to retrieve blocks: {}", DaError::BlobNotFound),
                    da_height,
                    blocks: vec![],
                };
            }
            Err(e) => {
                return RetrieveBlocksResult::error(
                    da_height,
                    format!("failed to get IDs at DA height {da_height}: {e}"),
                );
            }
        };

        if ids.is_empty() {
            return RetrieveBlocksResult {
                code: StatusCode::NotFound,
                message: format!("failed to retrieve blocks: {}", DaError::BlobNotFound),
                da_height,
                blocks: vec![],
            };
        }

        let blobs = match self.da.get(&ids, self.namespace).await {
            Ok(blobs) => blobs,
            Err(e) => {
                return RetrieveBlocksResult::error(
                    da_height,
                    format!("failed to get blobs at DA height {da_height}: {e}"),
                );
            }
        };

        let mut blocks = Vec::with_capacity(blobs.len());
        for (position, blob) in blobs.iter().enumerate() {
            match Block::decode(blob) {
                Ok(block) => blocks.push(block),
                // The namespace can carry foreign or malformed blobs; skip them.
                Err(e) => {
                    warn!(da_height, position, error = %e, "failed to deserialize block");
                }
            }
        }

        RetrieveBlocksResult {
            code: StatusCode::Success,
            message: String::new(),
            da_height,
            blocks,
        }
    }
}

/// Index of the first blob that would push the cumulative batch size over
/// `max_blob_size`. Packing is greedy and order-preserving.
fn batch_cut_point(blobs: &[Blob], max_blob_size: u64) -> usize {
    let mut total: u64 = 0;
    for (i, blob) in blobs.iter().enumerate() {
        total += blob.len() as u64;
        if total > max_blob_size {
            return i;
        }
    }
    blobs.len()
}
