//! HTTP transport capabilities.
//!
//! A reqwest-backed client for outbound API calls and an axum-backed
//! listener for inbound callbacks.

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::{DEFAULT_TIMEOUT, HttpClientCapabilityImpl};

#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::HttpServerCapabilityImpl;
