//! Block lifecycle core of the rollup node.
//!
//! [`Manager`] runs four cooperating loops: aggregation (authoring new
//! blocks), DA submission, DA retrieval and apply. [`PendingBlocks`] tracks
//! which locally committed blocks still need to reach the DA layer with
//! at-least-once, in-order semantics.
#![forbid(unsafe_code)]

mod error;
mod executor;
mod manager;
mod mempool;
mod metrics;
mod pending_blocks;
mod signer;

pub use error::SyncError;
pub use executor::{Executor, HashExecutor, TxResults};
pub use manager::{Manager, BROADCAST_CHANNEL_CAPACITY};
pub use mempool::{InMemoryMempool, Mempool};
pub use pending_blocks::{PendingBlocks, LAST_SUBMITTED_HEIGHT_KEY};
pub use signer::{parse_proposer_pubkey, proposer_address, verify_commit, ProposerKey};
