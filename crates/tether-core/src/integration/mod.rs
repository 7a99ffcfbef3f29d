//! Integration layer - External system interfaces.
//!
//! This module contains interfaces for integrating with external systems:
//! - Adapter system for platform implementations
//! - Capability-based transport system

pub mod adapter;
pub mod capability;

pub use adapter::{Adapter, AdapterContext, BoxedAdapter, BuildContext, ConfigurableAdapter};

pub use capability::{
    BoxedConnectionHandler, BoxedRequestHandler, ClientConfig, ConnectionHandle,
    ConnectionHandler, ConnectionInfo, DisconnectReason, ExtraRoute, HttpClientCapability,
    HttpRequest, HttpResponse, HttpServerCapability, ListenConfig, ListenerHandle,
    RequestHandler, TlsConfig, TransportContext, WsClientCapability,
};
