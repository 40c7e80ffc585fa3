//! Full node shell: wires the store, DA client and block manager together
//! and supervises the lifecycle loops.
#![forbid(unsafe_code)]

mod full_node;
mod gossip;

pub use full_node::{da_client_kv, indexer_kv, main_kv, FullNode};
pub use gossip::{NoopSyncService, SyncService};
