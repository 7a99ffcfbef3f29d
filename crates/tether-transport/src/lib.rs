//! # Tether Transport
//!
//! Network transport capability implementations for the Tether chat bridge.
//!
//! This crate provides concrete implementations of the capability traits
//! defined in `tether-core`. Each transport sits behind a feature flag.
//!
//! ## Features
//!
//! - `ws-client`: WebSocket client capability
//! - `http-client`: HTTP client capability
//! - `http-server`: HTTP server capability
//! - `tls`: HTTPS for the HTTP server
//! - `full`: All plain-text capabilities
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Adapter Layer      │  (Slack)
//! │  (uses capabilities)│
//! ├─────────────────────┤
//! │  tether-core        │  (capability traits)
//! ├─────────────────────┤
//! │  tether-transport   │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (TCP/HTTP) │
//! └─────────────────────┘
//! ```
//!
//! ## Capability Implementations
//!
//! | Capability | Description | Use Case |
//! |------------|-------------|----------|
//! | `WsClientCapability` | WebSocket client | Real-time event stream |
//! | `HttpClientCapability` | HTTP client | Web API calls |
//! | `HttpServerCapability` | HTTP server | Event callbacks |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tether_transport::WsClientCapabilityImpl;
//! use tether_core::{WsClientCapability, ClientConfig};
//!
//! let capability = WsClientCapabilityImpl::new();
//!
//! // The handler resolves the URL itself, before every attempt.
//! let handle = capability.connect(handler, ClientConfig::default()).await?;
//! ```
//!
//! ```rust,ignore
//! use tether_transport::HttpServerCapabilityImpl;
//! use tether_core::{HttpServerCapability, ListenConfig};
//!
//! let server = HttpServerCapabilityImpl::new();
//! let listener = server
//!     .listen(ListenConfig::new("0.0.0.0:3000", "/slack/events"), handler)
//!     .await?;
//!
//! // Later
//! listener.shutdown().await?;
//! ```

// Transport implementations (feature-gated)
#[cfg(any(feature = "http-client", feature = "http-server"))]
pub mod http;

#[cfg(feature = "ws-client")]
pub mod websocket;

// Capability re-exports
#[cfg(feature = "ws-client")]
pub use websocket::WsClientCapabilityImpl;

#[cfg(feature = "http-server")]
pub use http::HttpServerCapabilityImpl;

#[cfg(feature = "http-client")]
pub use http::HttpClientCapabilityImpl;
