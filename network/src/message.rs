//! Wire framing for peer-to-peer transfers.
//!
//! A transfer is one length-prefixed, `bincode`-encoded [`Envelope`] over a
//! plain TCP stream: a 4-byte big-endian length followed by that many
//! bytes. `libp2p`'s `PeerId` tags the envelope with who the sender claims
//! to be at the transport layer, independent of the `obscura_core::NodeId`
//! the recipient ultimately resolves it to.

use libp2p::identity::{self, PeerId};
use obscura_core::{Proof, Transaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Refuses to allocate for a claimed length past this; large enough for any
/// plausible proof, small enough to not be a trivial memory-exhaustion
/// vector from a malicious peer.
const MAX_MESSAGE_BYTES: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("message of {0} bytes exceeds the {MAX_MESSAGE_BYTES}-byte limit")]
    TooLarge(u32),
    #[error("failed to decode message: {0}")]
    Decode(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, MessageError>;

/// One `(transaction, proof)` delivery, as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    from: Vec<u8>,
    pub transaction: Transaction,
    pub proof: Proof,
}

impl Envelope {
    pub fn new(from: PeerId, transaction: Transaction, proof: Proof) -> Self {
        Self { from: from.to_bytes(), transaction, proof }
    }

    /// The sender's transport-layer identity, if the bytes on the wire
    /// still decode to a valid `PeerId`.
    pub fn from_peer_id(&self) -> Option<PeerId> {
        PeerId::from_bytes(&self.from).ok()
    }
}

/// Derives a `PeerId` from an Ed25519 public key, so the transport layer
/// has a real use for `libp2p`'s identity types instead of carrying the
/// dependency unused.
pub fn peer_id_from_public_key(public_key: &obscura_core::crypto::PublicKeyBytes) -> std::result::Result<PeerId, identity::DecodingError> {
    let ed25519_key = identity::ed25519::PublicKey::try_from_bytes(public_key)?;
    Ok(PeerId::from(identity::PublicKey::from(ed25519_key)))
}

pub async fn write_message<W: AsyncWriteExt + Unpin>(writer: &mut W, envelope: &Envelope) -> Result<()> {
    let bytes = bincode::serialize(envelope)?;
    let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    if len > MAX_MESSAGE_BYTES {
        return Err(MessageError::TooLarge(len));
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Envelope> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_BYTES {
        return Err(MessageError::TooLarge(len));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(bincode::deserialize(&buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscura_core::proof::ChainUpdates;

    fn sample_envelope() -> Envelope {
        let tx = Transaction {
            number: 0,
            sender_id: None,
            receiver_id: 1,
            amount: 10,
            remainder: 0,
            sources: vec![],
            block_number: Some(0),
            signature: vec![],
        };
        let keypair = identity::Keypair::generate_ed25519();
        Envelope::new(PeerId::from(keypair.public()), tx, Proof { transaction: sample_tx(), chain_updates: ChainUpdates::new() })
    }

    fn sample_tx() -> Transaction {
        Transaction {
            number: 0,
            sender_id: None,
            receiver_id: 1,
            amount: 10,
            remainder: 0,
            sources: vec![],
            block_number: Some(0),
            signature: vec![],
        }
    }

    #[tokio::test]
    async fn envelope_round_trips_over_a_duplex_stream() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let envelope = sample_envelope();
        write_message(&mut a, &envelope).await.unwrap();
        let decoded = read_message(&mut b).await.unwrap();
        assert_eq!(decoded.transaction.receiver_id, envelope.transaction.receiver_id);
        assert!(decoded.from_peer_id().is_some());
    }

    #[test]
    fn peer_id_derivation_is_deterministic() {
        let (_, public_bytes) = obscura_core::crypto::generate();
        let a = peer_id_from_public_key(&public_bytes).unwrap();
        let b = peer_id_from_public_key(&public_bytes).unwrap();
        assert_eq!(a, b);
    }
}
