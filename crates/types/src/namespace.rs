use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-rollup 8-byte identifier multiplexed with the DA layer.
///
/// Rendered as hex in configs and logs.
#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct NamespaceId(#[serde(with = "hex::serde")] pub [u8; 8]);

impl NamespaceId {
    pub const SIZE: usize = 8;

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Debug for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamespaceId({})", hex::encode(self.0))
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[derive(Debug, Error)]
pub enum NamespaceIdError {
    #[error("namespace id must be {expected} bytes of hex, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error(transparent)]
    InvalidHex(#[from] hex::FromHexError),
}

impl FromStr for NamespaceId {
    type Err = NamespaceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| NamespaceIdError::InvalidLength {
                expected: Self::SIZE,
                actual: v.len(),
            })?;
        Ok(NamespaceId(arr))
    }
}
