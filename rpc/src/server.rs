//! This node's own status/query RPC surface, so local tooling
//! (`obscura-cli`) can inspect a running node without reaching into its
//! process internals.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use obscura_core::LocalStore;

#[rpc(server, namespace = "obscura")]
pub trait NodeApi {
    /// Highest main-chain height this node's abstract cache has caught up
    /// to.
    #[method(name = "height")]
    async fn height(&self) -> RpcResult<u64>;

    /// Number of unspent transactions this node currently holds.
    #[method(name = "unspentCount")]
    async fn unspent_count(&self) -> RpcResult<usize>;

    /// Whether `(chain_owner_id, block_number, number)` has already been
    /// consumed as a transaction source.
    #[method(name = "isConsumed")]
    async fn is_consumed(&self, chain_owner_id: u32, block_number: u32, number: u32) -> RpcResult<bool>;
}

pub struct NodeApiImpl {
    store: Arc<LocalStore>,
}

impl NodeApiImpl {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }
}

#[jsonrpsee::core::async_trait]
impl NodeApiServer for NodeApiImpl {
    async fn height(&self) -> RpcResult<u64> {
        Ok(self.store.abstract_cache.current_height())
    }

    async fn unspent_count(&self) -> RpcResult<usize> {
        Ok(self.store.unspent().len())
    }

    async fn is_consumed(&self, chain_owner_id: u32, block_number: u32, number: u32) -> RpcResult<bool> {
        Ok(self.store.is_consumed(chain_owner_id, block_number, number))
    }
}

/// Starts serving `NodeApi` at `addr`. The returned handle keeps the
/// server alive; dropping it (or calling `.stop()`) shuts it down.
pub async fn serve(addr: SocketAddr, store: Arc<LocalStore>) -> std::result::Result<(SocketAddr, ServerHandle), std::io::Error> {
    let server = Server::builder().build(addr).await?;
    let local_addr = server.local_addr()?;
    let handle = server.start(NodeApiImpl::new(store).into_rpc());
    Ok((local_addr, handle))
}
