use async_trait::async_trait;
use laminar_types::{Block, SignedHeader};

/// Narrow contract of the P2P sync services: fan produced headers and blocks
/// out to the network. Wire format and peer management live with the
/// implementation.
#[async_trait]
pub trait SyncService: Send + Sync + 'static {
    async fn broadcast_header(&self, header: SignedHeader) -> anyhow::Result<()>;

    async fn broadcast_block(&self, block: Block) -> anyhow::Result<()>;
}

/// Gossip sink for nodes running without P2P.
pub struct NoopSyncService;

#[async_trait]
impl SyncService for NoopSyncService {
    async fn broadcast_header(&self, _header: SignedHeader) -> anyhow::Result<()> {
        Ok(())
    }

    async fn broadcast_block(&self, _block: Block) -> anyhow::Result<()> {
        Ok(())
    }
}
