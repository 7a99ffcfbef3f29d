//! Foundation layer - Core abstractions and type system.
//!
//! This module contains the fundamental building blocks of Tether:
//! - Canonical and brain event vocabularies
//! - Session state of an authenticated adapter
//! - The sink the brain listens on
//! - Error types

pub mod error;
pub mod event;
pub mod session;
pub mod sink;

pub use error::{
    AdapterError, AdapterResult, ApiError, ApiResult, TransportError, TransportResult,
};
pub use event::{
    BrainEvent, CanonicalEvent, Identity, IncomingMessage, MessageRef, ReactionAdded,
    ReceivedMessage,
};
pub use session::SessionState;
pub use sink::{BoxedSink, ChannelSink, EventSink, RecordingSink};
