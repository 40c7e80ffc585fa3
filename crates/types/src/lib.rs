//! Core data types of the laminar rollup: blocks, headers, commits and the
//! state snapshot that the block lifecycle advances.
#![forbid(unsafe_code)]

mod block;
mod namespace;
mod state;
pub mod test_utils;
pub mod time;

pub use block::{
    Block, BlockValidationError, Commit, Data, Header, SignedHeader, Signature, Version,
};
pub use namespace::{NamespaceId, NamespaceIdError};
pub use state::State;

/// A 32-byte hash as produced by the canonical SHA-256 hasher.
pub type Hash = [u8; 32];

/// An opaque user transaction. The lifecycle core never inspects tx contents.
pub type Tx = Vec<u8>;
