//! # Tether Core
//!
//! The core engine of the Tether chat bridge.
//!
//! Tether sits between a chat platform and a bot "brain". Adapters receive
//! platform events over one or more transports, translate them into a single
//! canonical vocabulary and push them into a shared funnel. One dispatch loop
//! drains the funnel, decides which events the brain should see, and hands
//! them to an [`EventSink`].
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! Core abstractions and type system:
//! - **Events**: [`CanonicalEvent`] from transports, [`BrainEvent`] for the brain
//! - **Session**: who the adapter is authenticated as ([`SessionState`])
//! - **Sink**: the brain's inbox ([`EventSink`])
//! - **Errors**: [`TransportError`], [`ApiError`], [`AdapterError`]
//!
//! ### Framework Layer
//!
//! Event processing:
//! - **Funnel**: bounded many-producer queue ([`funnel`])
//! - **Addressing**: "is this message for us?" ([`Addressing`])
//! - **Directory**: cached user identities ([`UserDirectory`])
//! - **Dispatch**: the single consumer ([`DispatchLoop`])
//!
//! ### Integration Layer
//!
//! External system interfaces:
//! - **Adapter System**: platform implementations ([`Adapter`])
//! - **Capability System**: transports provided by the runtime ([`TransportContext`])
//!
//! ## Data Flow
//!
//! ```text
//! ┌───────────┐
//! │    RTM    │──┐
//! └───────────┘  │   ┌────────┐   ┌──────────┐   ┌──────┐
//!                ├──▶│ Funnel │──▶│ Dispatch │──▶│ Sink │
//! ┌───────────┐  │   └────────┘   └──────────┘   └──────┘
//! │Events API │──┘
//! └───────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_core::prelude::*;
//!
//! let (tx, rx) = funnel(DEFAULT_FUNNEL_CAPACITY);
//! let addressing = Addressing::new(session, AddressingPolicy::default());
//! let sink: BoxedSink = Arc::new(|event: BrainEvent| println!("{event:?}"));
//!
//! let task = DispatchLoop::new(rx, addressing, directory, sink).spawn();
//! tx.push(event).await?;
//! ```

// Architectural layers
pub mod foundation;
pub mod framework;
pub mod integration;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// Re-export foundation types
pub use foundation::{
    AdapterError, AdapterResult, ApiError, ApiResult, BoxedSink, BrainEvent, CanonicalEvent,
    ChannelSink, EventSink, Identity, IncomingMessage, MessageRef, ReactionAdded,
    ReceivedMessage, RecordingSink, SessionState, TransportError, TransportResult,
};

// Re-export framework types
pub use framework::{
    Addressing, AddressingPolicy, DEFAULT_FUNNEL_CAPACITY, DispatchLoop, DispatchState,
    ExitReason, FunnelClosed, FunnelReceiver, FunnelSender, UserDirectory, UserLookup, Verdict,
    funnel, strip_mention,
};

// Re-export integration types
pub use integration::{
    Adapter, AdapterContext, BoxedAdapter, BoxedConnectionHandler, BoxedRequestHandler,
    BuildContext, ClientConfig, ConfigurableAdapter, ConnectionHandle, ConnectionHandler,
    ConnectionInfo, DisconnectReason, ExtraRoute, HttpClientCapability, HttpRequest,
    HttpResponse, HttpServerCapability, ListenConfig, ListenerHandle, RequestHandler, TlsConfig,
    TransportContext, WsClientCapability,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::*;
    pub use super::framework::{
        Addressing, AddressingPolicy, DEFAULT_FUNNEL_CAPACITY, DispatchLoop, ExitReason,
        FunnelSender, UserDirectory, UserLookup, funnel,
    };
    pub use super::integration::{
        Adapter, AdapterContext, BuildContext, ConfigurableAdapter, TransportContext,
    };
}
