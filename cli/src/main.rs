//! Bootstrap glue: wires `obscura-core`, `obscura-network`, `obscura-rpc`
//! and `obscura-wallet` into a runnable node process.
//!
//! Node discovery/tracking and the concrete main-chain implementation are
//! out of scope for this workspace (see `spec.md` §1); this binary only
//! exercises the library end to end.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use obscura_core::config::ConfigBuilder;
use obscura_core::LocalStore;
use obscura_network::{message, PeerServer};
use obscura_rpc::JsonRpcMainChainClient;
use obscura_wallet::Identity;
use tokio::sync::Semaphore;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "obscura")]
#[command(about = "Obscura scale-out ledger node", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate (or load) this node's identity and print its public key.
    Keygen {
        #[arg(long)]
        node_id: u32,
        #[arg(long)]
        address: String,
        #[arg(long, default_value = "identity.bin")]
        identity_path: PathBuf,
    },
    /// Run a node: serve peer connections and this node's own status RPC.
    Node {
        #[arg(long)]
        node_id: u32,
        #[arg(long, default_value = "identity.bin")]
        identity_path: PathBuf,
        #[arg(long)]
        listen_addr: SocketAddr,
        #[arg(long)]
        rpc_addr: SocketAddr,
        #[arg(long)]
        main_chain_url: String,
        /// Mints this many units to the node itself at genesis. Only
        /// meaningful the first time this identity is used.
        #[arg(long)]
        initial_supply: Option<u64>,
        /// Number of inbound `(transaction, proof)` envelopes processed
        /// concurrently.
        #[arg(long, default_value_t = 8)]
        worker_pool_size: usize,
        /// How often, in seconds, to poll the main chain for new height.
        #[arg(long, default_value_t = 5)]
        main_chain_poll_interval_secs: u64,
        /// Initial retry backoff, in seconds, for the abstract cache's
        /// startup sync.
        #[arg(long, default_value_t = 1)]
        initial_backoff_secs: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Keygen { node_id, address, identity_path } => {
            let identity = Identity::load_or_generate(&identity_path, node_id, address)?;
            println!("node {} public key: {}", identity.node_id, hex::encode(identity.public_key()));
            Ok(())
        }
        Commands::Node {
            node_id,
            identity_path,
            listen_addr,
            rpc_addr,
            main_chain_url,
            initial_supply,
            worker_pool_size,
            main_chain_poll_interval_secs,
            initial_backoff_secs,
        } => {
            let identity = Identity::load_or_generate(&identity_path, node_id, listen_addr.to_string())?;
            let public_key = *identity.public_key();
            let local_peer_id = message::peer_id_from_public_key(&public_key)?;

            info!(node_id = identity.node_id, %listen_addr, %local_peer_id, "starting node");

            let config = ConfigBuilder::new()
                .worker_pool_size(worker_pool_size)
                .main_chain_poll_interval_secs(main_chain_poll_interval_secs)
                .initial_backoff_secs(initial_backoff_secs)
                .finish();

            let main_chain = Arc::new(JsonRpcMainChainClient::new(&main_chain_url)?);
            let node = identity.into_node(initial_supply);
            let store = Arc::new(LocalStore::new(node, main_chain, None, config).await);

            let peer_server = PeerServer::bind(listen_addr).await?;
            let (rpc_local_addr, _rpc_handle) = obscura_rpc::serve(rpc_addr, store.clone()).await?;
            info!(%rpc_local_addr, "status RPC listening");

            tokio::spawn(poll_main_chain_height(store.clone()));

            let workers = Arc::new(Semaphore::new(store.config.worker_pool_size.max(1)));
            loop {
                match peer_server.accept().await {
                    Ok((peer_addr, envelope)) => {
                        let store = store.clone();
                        let workers = workers.clone();
                        tokio::spawn(async move {
                            let _permit = workers.acquire_owned().await.expect("semaphore never closed");
                            // Peer-id-to-node-id resolution is out of scope for this
                            // workspace (the tracker owns that mapping); the transfer's
                            // own sender field is used as a stand-in.
                            let Some(proof_sender_id) = envelope.transaction.sender_id else {
                                warn!(%peer_addr, "dropping envelope for a sourceless transaction with no sender to attribute it to");
                                return;
                            };
                            match store.receive(proof_sender_id, envelope.proof).await {
                                Ok(()) => info!(%peer_addr, receiver = envelope.transaction.receiver_id, "applied inbound transfer"),
                                Err(err) => warn!(%peer_addr, %err, "rejected inbound transfer"),
                            }
                        });
                    }
                    Err(err) => warn!(%err, "failed to decode an inbound connection"),
                }
            }
        }
    }
}

/// Periodically nudges the `AbstractCache` to catch up with the main
/// chain's latest height, independently of any in-flight `receive`/`send`
/// call that might otherwise be the only thing driving it forward.
async fn poll_main_chain_height(store: Arc<LocalStore>) {
    let mut interval = tokio::time::interval(Duration::from_secs(store.config.main_chain_poll_interval_secs.max(1)));
    loop {
        interval.tick().await;
        match store.main_chain.status().await {
            Ok(status) => store.abstract_cache.note_new_height(status.latest_height),
            Err(err) => warn!(%err, "main chain status poll failed"),
        }
    }
}
