//! Node configuration.
//!
//! Configs are plain serde structs read from TOML files; every field carries
//! a default so a node can boot from an empty file.
#![forbid(unsafe_code)]

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use laminar_types::NamespaceId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Reads a TOML file as a specific config type.
pub fn from_toml_path<P: AsRef<Path>, R: DeserializeOwned>(path: P) -> anyhow::Result<R> {
    let mut contents = String::new();
    {
        let mut file = File::open(path)?;
        file.read_to_string(&mut contents)?;
    }
    tracing::debug!("Config file size: {} bytes", contents.len());

    let result: R = toml::from_str(&contents)?;

    Ok(result)
}

/// Top-level node configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NodeConfig {
    /// Run the node as the block-authoring aggregator.
    #[serde(default)]
    pub aggregator: bool,
    /// In aggregator mode, wait for transactions instead of producing empty
    /// blocks on every tick.
    #[serde(default)]
    pub lazy_aggregator: bool,
    /// Hex-encoded ed25519 public key of the chain's aggregator. Followers
    /// verify the commits of retrieved blocks against it; required for any
    /// node that does not author blocks itself.
    #[serde(default)]
    pub proposer_pubkey: Option<String>,
    #[serde(flatten)]
    pub block_manager: BlockManagerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            aggregator: false,
            lazy_aggregator: false,
            proposer_pubkey: None,
            block_manager: BlockManagerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Parameters pacing the block lifecycle loops.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BlockManagerConfig {
    /// How often the eager aggregator produces a block, in milliseconds.
    #[serde(default = "default_block_time_ms")]
    pub block_time_ms: u64,
    /// Block time of the underlying DA layer; paces submission and
    /// retrieval, in milliseconds.
    #[serde(default = "default_da_block_time_ms")]
    pub da_block_time_ms: u64,
    /// Upper bound on aggregator idleness in lazy mode, in milliseconds.
    #[serde(default = "default_lazy_block_time_ms")]
    pub lazy_block_time_ms: u64,
    /// Skip the first `da_start_height - 1` DA heights when syncing.
    #[serde(default = "default_da_start_height")]
    pub da_start_height: u64,
    /// Gas price passed verbatim to DA submission; negative means
    /// layer-default.
    #[serde(default = "default_da_gas_price")]
    pub da_gas_price: f64,
    /// Bound on a single DA submission RPC, in milliseconds.
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,
    /// 8-byte rollup namespace on the DA layer, hex encoded.
    #[serde(default)]
    pub namespace_id: NamespaceId,
}

impl BlockManagerConfig {
    pub fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    pub fn da_block_time(&self) -> Duration {
        Duration::from_millis(self.da_block_time_ms)
    }

    pub fn lazy_block_time(&self) -> Duration {
        Duration::from_millis(self.lazy_block_time_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

impl Default for BlockManagerConfig {
    fn default() -> Self {
        BlockManagerConfig {
            block_time_ms: default_block_time_ms(),
            da_block_time_ms: default_da_block_time_ms(),
            lazy_block_time_ms: default_lazy_block_time_ms(),
            da_start_height: default_da_start_height(),
            da_gas_price: default_da_gas_price(),
            submit_timeout_ms: default_submit_timeout_ms(),
            namespace_id: NamespaceId::default(),
        }
    }
}

/// Storage configuration. Without a path the node runs on an in-memory KV
/// store, which is intended for tests and local experiments.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
    /// File descriptor limit for RocksDB.
    pub db_max_open_files: Option<i32>,
}

#[inline]
const fn default_block_time_ms() -> u64 {
    1_000
}

#[inline]
const fn default_da_block_time_ms() -> u64 {
    15_000
}

#[inline]
const fn default_lazy_block_time_ms() -> u64 {
    60_000
}

#[inline]
const fn default_da_start_height() -> u64 {
    1
}

#[inline]
const fn default_da_gas_price() -> f64 {
    -1.0
}

#[inline]
const fn default_submit_timeout_ms() -> u64 {
    60_000
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_full_config() {
        let file = write_config(
            r#"
            aggregator = true
            lazy_aggregator = true
            proposer_pubkey = "6f0f1dd1e4a4dde52ae9ab5a2a0c0c9d3b9f4f33881289c0ca5ab4a4a79e9a11"
            block_time_ms = 250
            da_block_time_ms = 5000
            lazy_block_time_ms = 30000
            da_start_height = 7
            da_gas_price = 0.02
            submit_timeout_ms = 10000
            namespace_id = "0011223344556677"

            [storage]
            path = "/tmp/laminar"
            db_max_open_files = 512
            "#,
        );

        let config: NodeConfig = from_toml_path(file.path()).unwrap();
        assert!(config.aggregator);
        assert!(config.lazy_aggregator);
        assert_eq!(
            config.proposer_pubkey.as_deref(),
            Some("6f0f1dd1e4a4dde52ae9ab5a2a0c0c9d3b9f4f33881289c0ca5ab4a4a79e9a11")
        );
        assert_eq!(config.block_manager.block_time(), Duration::from_millis(250));
        assert_eq!(config.block_manager.da_start_height, 7);
        assert_eq!(config.block_manager.da_gas_price, 0.02);
        assert_eq!(
            config.block_manager.namespace_id.to_string(),
            "0011223344556677"
        );
        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/laminar")));
        assert_eq!(config.storage.db_max_open_files, Some(512));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let file = write_config("");
        let config: NodeConfig = from_toml_path(file.path()).unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.block_manager.block_time(), Duration::from_secs(1));
        assert_eq!(config.block_manager.da_block_time(), Duration::from_secs(15));
        assert_eq!(config.block_manager.submit_timeout(), Duration::from_secs(60));
        assert!(config.storage.path.is_none());
    }
}
