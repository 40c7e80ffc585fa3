use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use laminar_block::{
    parse_proposer_pubkey, proposer_address, HashExecutor, InMemoryMempool, ProposerKey,
};
use laminar_config::{from_toml_path, NodeConfig};
use laminar_da::DummyDa;
use laminar_node::{FullNode, NoopSyncService};
use laminar_store::{InMemoryKv, KvStore, RocksKv};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the node config; defaults apply when omitted.
    #[arg(long)]
    config: Option<String>,

    /// Run the node in aggregator mode.
    #[arg(long)]
    aggregator: bool,

    /// Wait for transactions instead of producing empty blocks.
    #[arg(long)]
    lazy_aggregator: bool,

    /// Hex-encoded ed25519 public key of the chain's aggregator. Required
    /// in follower mode; overrides the config file.
    #[arg(long)]
    proposer_pubkey: Option<String>,

    /// Logging verbosity.
    #[arg(long, short = 'v', action = clap::ArgAction::Count, default_value = "0")]
    verbose: u8,

    /// Silence all but warnings and errors.
    #[arg(long, short = 'q')]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    initialize_logging(&args);

    let mut config: NodeConfig = match &args.config {
        Some(path) => from_toml_path(path).context("failed to read node configuration")?,
        None => NodeConfig::default(),
    };
    config.aggregator |= args.aggregator;
    config.lazy_aggregator |= args.lazy_aggregator;
    if args.proposer_pubkey.is_some() {
        config.proposer_pubkey = args.proposer_pubkey;
    }

    match config.storage.path.clone() {
        Some(path) => {
            let kv = RocksKv::open(&path, config.storage.db_max_open_files)
                .context("failed to open node database")?;
            run_node(config, Arc::new(kv)).await
        }
        None => {
            info!("WARNING: no storage path configured, working in in-memory mode");
            run_node(config, Arc::new(InMemoryKv::new())).await
        }
    }
}

async fn run_node<K: KvStore>(config: NodeConfig, base_kv: Arc<K>) -> anyhow::Result<()> {
    // The shipped DA binding is the in-memory layer; production deployments
    // inject their own DataAvailability implementation here.
    let da = Arc::new(DummyDa::new(config.block_manager.da_block_time()));

    // The aggregator authors with its own key; a follower verifies retrieved
    // commits against the configured aggregator key.
    let (proposer, signer) = if config.aggregator {
        let signer = ProposerKey::generate();
        info!(
            proposer_pubkey = %signer.public_key_hex(),
            "generated aggregator signing key; configure followers with this key"
        );
        (signer.verifying_key(), Some(signer))
    } else {
        let hex_key = config
            .proposer_pubkey
            .as_deref()
            .context("follower mode requires proposer_pubkey to verify retrieved blocks")?;
        (parse_proposer_pubkey(hex_key)?, None)
    };

    let executor = HashExecutor::new(
        config.block_manager.namespace_id,
        proposer_address(&proposer),
    );
    let mempool = Arc::new(InMemoryMempool::new());

    let mut node = FullNode::new(
        config.clone(),
        base_kv,
        da,
        executor,
        mempool,
        Arc::new(NoopSyncService),
        proposer,
        signer,
    )?;
    node.start()?;
    node.wait_shutdown().await
}

fn initialize_logging(args: &Args) {
    let default_level = if args.quiet {
        "warn"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,laminar={default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
