//! JSON-RPC wire types for the main-chain boundary.
//!
//! `obscura_core::BlockAbstract` carries a fixed-size hash and a raw
//! signature; both travel as hex strings over JSON-RPC, the usual
//! convention for binary payloads in a JSON transport.

use obscura_core::{BlockAbstract, NodeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("block hash must be exactly 32 bytes, got {0}")]
    BadHashLength(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockAbstractDto {
    pub owner_id: NodeId,
    pub block_number: u32,
    pub block_hash: String,
    pub signature: String,
}

impl From<&BlockAbstract> for BlockAbstractDto {
    fn from(a: &BlockAbstract) -> Self {
        Self {
            owner_id: a.owner_id,
            block_number: a.block_number,
            block_hash: hex::encode(a.block_hash),
            signature: hex::encode(&a.signature),
        }
    }
}

impl TryFrom<&BlockAbstractDto> for BlockAbstract {
    type Error = WireError;

    fn try_from(dto: &BlockAbstractDto) -> Result<Self, Self::Error> {
        let hash_bytes = hex::decode(&dto.block_hash)?;
        if hash_bytes.len() != 32 {
            return Err(WireError::BadHashLength(hash_bytes.len()));
        }
        let mut block_hash = [0u8; 32];
        block_hash.copy_from_slice(&hash_bytes);
        Ok(BlockAbstract { owner_id: dto.owner_id, block_number: dto.block_number, block_hash, signature: hex::decode(&dto.signature)? })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatusDto {
    pub latest_height: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_abstract_round_trips_through_its_dto() {
        let original = BlockAbstract { owner_id: 1, block_number: 3, block_hash: [7u8; 32], signature: vec![1, 2, 3] };
        let dto = BlockAbstractDto::from(&original);
        let back = BlockAbstract::try_from(&dto).unwrap();
        assert_eq!(original.owner_id, back.owner_id);
        assert_eq!(original.block_number, back.block_number);
        assert_eq!(original.block_hash, back.block_hash);
        assert_eq!(original.signature, back.signature);
    }

    #[test]
    fn rejects_a_malformed_hash() {
        let dto = BlockAbstractDto {
            owner_id: 1,
            block_number: 0,
            block_hash: "not-hex".to_string(),
            signature: String::new(),
        };
        assert!(BlockAbstract::try_from(&dto).is_err());
    }
}
