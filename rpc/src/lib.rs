//! JSON-RPC boundary: a client that consumes the external main chain, and
//! a server exposing this node's own status to local tooling.

pub mod client;
pub mod server;
pub mod wire;

pub use client::JsonRpcMainChainClient;
pub use server::{serve, NodeApiServer};
