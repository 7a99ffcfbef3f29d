//! Decides whether an inbound message is meant for the bot.
//!
//! A message is accepted when it was not written by the bot itself and any
//! of these hold:
//!
//! - it was posted in a direct-message channel,
//! - it mentions the bot,
//! - passive listening is enabled.
//!
//! Accepted text has a leading mention removed and surrounding whitespace
//! trimmed.

use std::sync::Arc;

use crate::foundation::event::{IncomingMessage, ReceivedMessage};
use crate::foundation::session::SessionState;

/// Knobs for [`Addressing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressingPolicy {
    /// Accept every non-self message, mentioned or not.
    pub listen_passive: bool,
    /// Channel ID prefix that marks direct-message channels.
    pub direct_prefix: String,
}

impl Default for AddressingPolicy {
    fn default() -> Self {
        Self {
            listen_passive: false,
            direct_prefix: "D".to_string(),
        }
    }
}

/// Outcome of [`Addressing::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Forward this message to the brain.
    Forward(ReceivedMessage),
    /// The bot wrote it.
    SelfAuthored,
    /// Not a direct message, no mention, passive listening off.
    NotAddressed,
}

/// The addressing filter.
#[derive(Debug, Clone)]
pub struct Addressing {
    session: Arc<SessionState>,
    policy: AddressingPolicy,
}

impl Addressing {
    /// Creates a filter for the given session.
    pub fn new(session: Arc<SessionState>, policy: AddressingPolicy) -> Self {
        Self { session, policy }
    }

    /// The session this filter recognises as "self".
    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// The active policy.
    pub fn policy(&self) -> &AddressingPolicy {
        &self.policy
    }

    /// Returns `true` if `channel` is a direct-message channel.
    pub fn is_direct(&self, channel: &str) -> bool {
        !self.policy.direct_prefix.is_empty() && channel.starts_with(&self.policy.direct_prefix)
    }

    /// Classifies one message.
    pub fn evaluate(&self, message: IncomingMessage) -> Verdict {
        if self.session.is_self(&message.author) {
            return Verdict::SelfAuthored;
        }

        let token = self.session.mention_token();
        let addressed = self.is_direct(&message.channel)
            || self.policy.listen_passive
            || message.text.contains(token);
        if !addressed {
            return Verdict::NotAddressed;
        }

        Verdict::Forward(ReceivedMessage {
            text: strip_mention(&message.text, token),
            channel: message.channel,
            id: message.id,
            author_id: message.author,
            raw: message.raw,
        })
    }
}

/// Removes leading `token`s and trims surrounding whitespace.
///
/// Repeated leading mentions are all removed, which makes the function
/// idempotent. A mention anywhere else is left alone.
pub fn strip_mention(text: &str, token: &str) -> String {
    let mut rest = text.trim();
    if !token.is_empty() {
        while let Some(stripped) = rest.strip_prefix(token) {
            rest = stripped.trim_start();
        }
    }
    rest.to_string()
}
