//! Slack inner events.
//!
//! RTM frames and Events API callbacks carry the same inner event objects,
//! tagged by their `type` field:
//!
//! ```text
//! {"type": "message", "channel": "C1", "user": "U1", "text": "hi", "ts": "1.2"}
//! {"type": "reaction_added", "user": "U1", "reaction": "+1", "item": {...}}
//! {"type": "user_typing", "channel": "C1", "user": "U1"}
//! {"type": "error", "error": {"code": 1, "msg": "Socket URL has expired"}}
//! ```
//!
//! [`SlackEvent::decode`] turns one of those objects into a closed enum.
//! Types without a rule become [`SlackEvent::Unknown`] with the payload kept.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A decoded Slack event.
#[derive(Debug, Clone, PartialEq)]
pub enum SlackEvent {
    /// `message` or `app_mention`.
    Message(MessageEvent),
    /// `reaction_added`.
    ReactionAdded(ReactionAddedEvent),
    /// `user_typing`.
    UserTyping(UserTypingEvent),
    /// RTM `error` frame.
    RtmError(RtmErrorEvent),
    /// Anything else.
    Unknown {
        /// The `type` field, empty when missing.
        tag: String,
        /// The whole object.
        payload: Value,
    },
}

impl SlackEvent {
    /// Decodes an inner event object by its `type` tag.
    ///
    /// Fails only when a known tag carries fields of the wrong shape.
    pub fn decode(payload: Value) -> Result<Self, serde_json::Error> {
        let tag = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(match tag.as_str() {
            "message" | "app_mention" => Self::Message(MessageEvent::deserialize(&payload)?),
            "reaction_added" => Self::ReactionAdded(ReactionAddedEvent::deserialize(&payload)?),
            "user_typing" => Self::UserTyping(UserTypingEvent::deserialize(&payload)?),
            "error" => Self::RtmError(RtmErrorEvent::deserialize(&payload)?),
            _ => Self::Unknown { tag, payload },
        })
    }

    /// The `type` tag this event was decoded from.
    pub fn tag(&self) -> &str {
        match self {
            Self::Message(msg) => &msg.kind,
            Self::ReactionAdded(_) => "reaction_added",
            Self::UserTyping(_) => "user_typing",
            Self::RtmError(_) => "error",
            Self::Unknown { tag, .. } => tag,
        }
    }
}

/// A message, in the shape both transports agree on.
///
/// This is also what `ReceivedMessage::raw` holds for Slack messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// `message` or `app_mention`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    /// Message timestamp, Slack's message identifier within a channel.
    #[serde(default)]
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited: Option<Edited>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icons: Option<Icons>,
}

impl MessageEvent {
    /// Subtypes whose payloads carry no top-level author or text.
    pub const IGNORED_SUBTYPES: [&'static str; 2] = ["message_changed", "message_deleted"];

    /// Returns `true` for subtypes the adapter drops.
    pub fn is_ignored_subtype(&self) -> bool {
        self.subtype
            .as_deref()
            .is_some_and(|s| Self::IGNORED_SUBTYPES.contains(&s))
    }

    /// The JSON object handed to the brain as `raw`.
    ///
    /// Same shape as the serialized struct, built without a fallible
    /// serializer.
    pub fn raw(&self) -> Value {
        let mut raw = Map::new();
        raw.insert("type".into(), json!(self.kind));
        raw.insert("channel".into(), json!(self.channel));
        raw.insert("user".into(), json!(self.user));
        raw.insert("text".into(), json!(self.text));
        raw.insert("ts".into(), json!(self.ts));
        insert_some(&mut raw, "thread_ts", &self.thread_ts);
        if let Some(edited) = &self.edited {
            raw.insert("edited".into(), json!({"user": edited.user, "ts": edited.ts}));
        }
        insert_some(&mut raw, "subtype", &self.subtype);
        insert_some(&mut raw, "event_ts", &self.event_ts);
        insert_some(&mut raw, "bot_id", &self.bot_id);
        insert_some(&mut raw, "username", &self.username);
        if let Some(icons) = &self.icons {
            let mut obj = Map::new();
            insert_some(&mut obj, "icon_url", &icons.icon_url);
            insert_some(&mut obj, "icon_emoji", &icons.icon_emoji);
            raw.insert("icons".into(), Value::Object(obj));
        }
        Value::Object(raw)
    }
}

fn insert_some(map: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        map.insert(key.into(), json!(v));
    }
}

/// Edit metadata of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edited {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub ts: String,
}

/// Custom icons of a bot message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icons {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
}

/// `reaction_added`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionAddedEvent {
    /// Who reacted.
    #[serde(default)]
    pub user: String,
    /// Author of the reacted-to item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_user: Option<String>,
    /// Shortcode without colons.
    #[serde(default)]
    pub reaction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_ts: Option<String>,
    pub item: ReactionItem,
}

impl ReactionAddedEvent {
    /// The JSON object handed to the brain as `raw`.
    pub fn raw(&self) -> Value {
        let mut raw = Map::new();
        raw.insert("user".into(), json!(self.user));
        insert_some(&mut raw, "item_user", &self.item_user);
        raw.insert("reaction".into(), json!(self.reaction));
        insert_some(&mut raw, "event_ts", &self.event_ts);
        raw.insert(
            "item".into(),
            json!({"type": self.item.kind, "channel": self.item.channel, "ts": self.item.ts}),
        );
        Value::Object(raw)
    }
}

/// What a reaction was added to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionItem {
    /// `message`, `file` or `file_comment`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ts: String,
}

/// `user_typing`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTypingEvent {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: String,
}

/// RTM `error` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtmErrorEvent {
    pub error: RtmErrorBody,
}

/// Body of an RTM `error` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtmErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}
