//! Peer-to-peer transport for Obscura nodes.
//!
//! Implements the `obscura_core::communication::PeerTransport` seam with a
//! concrete `tokio` TCP transport. Framing and node-discovery particulars
//! are this crate's concern; everything about *what* gets sent stays in
//! `obscura-core`.

pub mod message;
pub mod transport;

pub use message::Envelope;
pub use transport::{PeerServer, TcpPeerTransport};
