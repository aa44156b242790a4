//! # Network Module
//!
//! Everything between a built request and a node's reply.
//!
//! ## Architecture
//!
//! ```text
//! channel.rs   Channel / ChannelFactory traits, wire request/response types
//! node.rs      One endpoint: address, account id, cached channel, health
//! registry.rs  The node set: selection, lazy channels, health bookkeeping
//! rpc.rs       JSON-RPC 2.0 envelope and method names
//! http.rs      reqwest-backed JSON-RPC channel
//! ```
//!
//! ## Design Decisions
//!
//! - The engine depends only on the [`Channel`] trait. Production uses
//!   [`HttpChannel`]; tests plug in [`crate::mock::MockNetwork`].
//! - Health uses `parking_lot` locks rather than `tokio` ones: critical
//!   sections are a few field writes and never span an `.await`.
//! - Node health is measured on `tokio::time::Instant`, so paused-clock
//!   tests see exclusion windows expire without real waiting.

pub mod channel;
pub mod http;
pub mod node;
pub mod registry;
pub mod rpc;

pub use channel::{Channel, ChannelFactory, TransportError, WireRequest, WireResponse};
pub use http::{HttpChannel, HttpChannelFactory};
pub use node::{Node, NodeBackoff};
pub use registry::NodeRegistry;
pub use rpc::{RpcError, RpcMethod, RpcRequest, RpcResponse};
