//! Event vocabulary shared by transports, the dispatch loop and the sink.
//!
//! Two families live here:
//!
//! - [`CanonicalEvent`]: what a transport reports after translation. Every
//!   inbound payload becomes exactly one of these (or nothing, for payloads
//!   the translator deliberately ignores).
//! - [`BrainEvent`]: what the downstream bot brain receives once the
//!   dispatch loop has filtered and enriched a canonical event.
//!
//! ```text
//! transport payload ──▶ CanonicalEvent ──▶ (dispatch loop) ──▶ BrainEvent
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Canonical Events
// =============================================================================

/// A transport-neutral occurrence reported by the chat platform.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalEvent {
    /// A text message posted somewhere the bot can see.
    IncomingMessage(IncomingMessage),
    /// Someone reacted to a message.
    ReactionAdded(ReactionAdded),
    /// Someone started typing in a channel.
    UserTyping {
        /// Channel identifier.
        channel: String,
        /// Opaque user identifier of the typist.
        user: String,
    },
    /// The transport reported a recoverable error.
    TransportError {
        /// Platform error code, when one was given.
        code: Option<i64>,
        /// Human-readable description.
        message: String,
    },
    /// The credentials are no longer accepted.
    AuthInvalidated {
        /// Reason reported by the platform.
        reason: String,
    },
    /// The streaming connection went away.
    Disconnected {
        /// `true` when we asked for the disconnect.
        intentional: bool,
        /// What caused it, when known.
        cause: Option<String>,
    },
    /// A payload type we have no rule for.
    Unrecognized {
        /// The original type tag.
        tag: String,
        /// The original payload.
        payload: Value,
    },
}

impl CanonicalEvent {
    /// Returns a short name for the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IncomingMessage(_) => "incoming_message",
            Self::ReactionAdded(_) => "reaction_added",
            Self::UserTyping { .. } => "user_typing",
            Self::TransportError { .. } => "transport_error",
            Self::AuthInvalidated { .. } => "auth_invalidated",
            Self::Disconnected { .. } => "disconnected",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// An inbound text message.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    /// Channel identifier.
    pub channel: String,
    /// Author's user identifier. May be empty for some system messages.
    pub author: String,
    /// Platform message identifier (Slack uses the message timestamp).
    pub id: String,
    /// Message text as posted.
    pub text: String,
    /// The original payload, kept for downstream consumers.
    pub raw: Value,
}

/// A reaction added to a message.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionAdded {
    /// Channel of the reacted-to message.
    pub channel: String,
    /// Identifier of the reacted-to message.
    pub message_id: String,
    /// User who reacted.
    pub author: String,
    /// Reaction shortcode without colons, e.g. `thumbsup`.
    pub shortcode: String,
    /// The original payload.
    pub raw: Value,
}

// =============================================================================
// Identity
// =============================================================================

/// Display identity of a chat user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque platform user identifier.
    pub id: String,
    /// Display name, empty when unknown.
    #[serde(default)]
    pub name: String,
    /// Real name, empty when unknown.
    #[serde(default)]
    pub real_name: String,
}

impl Identity {
    /// Creates a fully resolved identity.
    pub fn new(id: impl Into<String>, name: impl Into<String>, real_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            real_name: real_name.into(),
        }
    }

    /// Creates an identity that only knows the user ID.
    pub fn minimal(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Returns `true` if anything beyond the ID is known.
    pub fn is_resolved(&self) -> bool {
        !self.name.is_empty() || !self.real_name.is_empty()
    }
}

// =============================================================================
// Brain Events
// =============================================================================

/// An event delivered to the bot brain.
#[derive(Debug, Clone, PartialEq)]
pub enum BrainEvent {
    /// A message addressed to the bot.
    ReceiveMessage(ReceivedMessage),
    /// A user started typing.
    UserTyping {
        /// The resolved (or minimal) identity of the typist.
        user: Identity,
        /// Channel identifier.
        channel: String,
    },
    /// Someone reacted to a message.
    ReactionAdded {
        /// Channel of the reacted-to message.
        channel: String,
        /// Identifier of the reacted-to message.
        message_id: String,
        /// User who reacted.
        author_id: String,
        /// Reaction shortcode.
        shortcode: String,
    },
}

impl BrainEvent {
    /// Returns the message payload if this is a `ReceiveMessage`.
    pub fn as_message(&self) -> Option<&ReceivedMessage> {
        match self {
            Self::ReceiveMessage(msg) => Some(msg),
            _ => None,
        }
    }
}

/// A message that passed addressing and is ready for the brain.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    /// Text with any leading mention removed.
    pub text: String,
    /// Channel identifier.
    pub channel: String,
    /// Platform message identifier.
    pub id: String,
    /// Author's user identifier.
    pub author_id: String,
    /// The original platform payload.
    pub raw: Value,
}

impl ReceivedMessage {
    /// Deserializes the raw payload into a platform-specific type.
    ///
    /// ```rust,ignore
    /// let slack: tether_adapter_slack::MessageEvent = msg.raw_as()?;
    /// ```
    pub fn raw_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.raw)
    }

    /// Returns a reference that can be passed to `Adapter::react`.
    pub fn message_ref(&self) -> MessageRef {
        MessageRef::new(&self.channel, &self.id)
    }
}

/// Points at one message for outbound operations such as reactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef {
    /// Channel identifier.
    pub channel: String,
    /// Message identifier.
    pub id: String,
}

impl MessageRef {
    /// Creates a message reference.
    pub fn new(channel: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_minimal() {
        let id = Identity::minimal("U123");
        assert_eq!(id.id, "U123");
        assert!(!id.is_resolved());
        assert!(Identity::new("U123", "fred", "Fred Flintstone").is_resolved());
    }

    #[test]
    fn test_raw_as() {
        #[derive(Deserialize)]
        struct Partial {
            ts: String,
        }

        let msg = ReceivedMessage {
            text: "hi".into(),
            channel: "C1".into(),
            id: "1.2".into(),
            author_id: "U1".into(),
            raw: json!({"ts": "1.2", "type": "message"}),
        };
        let partial: Partial = msg.raw_as().unwrap();
        assert_eq!(partial.ts, "1.2");
        assert_eq!(msg.message_ref(), MessageRef::new("C1", "1.2"));
    }

    #[test]
    fn test_event_kind() {
        let ev = CanonicalEvent::Disconnected {
            intentional: true,
            cause: None,
        };
        assert_eq!(ev.kind(), "disconnected");
    }
}
