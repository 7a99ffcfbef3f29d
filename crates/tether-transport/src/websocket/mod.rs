//! WebSocket transport capability.
//!
//! Streaming client with reconnect and heartbeat support.

mod client;

pub use client::WsClientCapabilityImpl;
