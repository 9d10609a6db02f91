//! `jsonrpsee`-based `MainChainClient`: consumes the external BFT main
//! chain's own RPC surface (out of scope for this workspace — see
//! `spec.md` §1) over plain JSON-RPC-over-HTTP.

use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use obscura_core::main_chain::{MainChainClient, MainChainStatus};
use obscura_core::{BlockAbstract, Error, Hash, Result};

use crate::wire::{BlockAbstractDto, StatusDto};

/// Method names on the external main chain's JSON-RPC surface. Fixed by
/// convention with whatever implements it; this crate only needs to agree
/// with the other side, not with anything else in this workspace.
mod methods {
    pub const STATUS: &str = "mainchain_status";
    pub const QUERY: &str = "mainchain_query";
    pub const COMMIT: &str = "mainchain_commit";
}

pub struct JsonRpcMainChainClient {
    client: HttpClient,
}

impl JsonRpcMainChainClient {
    pub fn new(url: &str) -> std::result::Result<Self, jsonrpsee::core::ClientError> {
        let client = HttpClientBuilder::default().build(url)?;
        Ok(Self { client })
    }
}

fn transport_error(context: &str, err: impl std::fmt::Display) -> Error {
    Error::TransportError(format!("{context}: {err}"))
}

#[async_trait]
impl MainChainClient for JsonRpcMainChainClient {
    async fn status(&self) -> Result<MainChainStatus> {
        let dto: StatusDto = self
            .client
            .request(methods::STATUS, rpc_params![])
            .await
            .map_err(|err| transport_error("main chain status", err))?;
        Ok(MainChainStatus { latest_height: dto.latest_height })
    }

    async fn query(&self, height: u64) -> Result<Vec<BlockAbstract>> {
        let dtos: Vec<BlockAbstractDto> = self
            .client
            .request(methods::QUERY, rpc_params![height])
            .await
            .map_err(|err| transport_error("main chain query", err))?;
        dtos.iter()
            .map(BlockAbstract::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| transport_error("decoding main chain query result", err))
    }

    async fn commit(&self, abstract_: BlockAbstract) -> Result<Hash> {
        let dto = BlockAbstractDto::from(&abstract_);
        let hash_hex: String = self
            .client
            .request(methods::COMMIT, rpc_params![dto])
            .await
            .map_err(|err| transport_error("main chain commit", err))?;
        let bytes = hex::decode(&hash_hex).map_err(|err| transport_error("decoding commit hash", err))?;
        if bytes.len() != 32 {
            return Err(transport_error("commit hash length", format!("expected 32 bytes, got {}", bytes.len())));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(hash)
    }
}
