//! Slack payloads to canonical events.
//!
//! Both transports end up here. RTM frames arrive as raw bytes, Events API
//! callbacks as the already-parsed `event` object of the envelope. Either
//! way the payload is decoded into a [`SlackEvent`] and then classified:
//!
//! | Slack event | canonical event |
//! |---|---|
//! | `message`, `app_mention` | `IncomingMessage` (unless `message_changed` / `message_deleted`) |
//! | `reaction_added` on a message | `ReactionAdded` |
//! | `reaction_added` on anything else | nothing |
//! | `user_typing` | `UserTyping` |
//! | RTM `error` | `TransportError` with code |
//! | undecodable RTM frame | `TransportError` without code |
//! | anything else | `Unrecognized` |

use serde_json::Value;
use tether_core::{CanonicalEvent, IncomingMessage, ReactionAdded};
use tracing::trace;

use crate::model::SlackEvent;

/// Translates one RTM frame.
///
/// Never fails: frames that cannot be decoded become a
/// `TransportError` event.
pub fn translate_rtm(frame: &[u8]) -> Option<CanonicalEvent> {
    let decoded = serde_json::from_slice::<Value>(frame).and_then(SlackEvent::decode);
    match decoded {
        Ok(event) => classify(event),
        Err(e) => Some(CanonicalEvent::TransportError {
            code: None,
            message: format!("failed to decode RTM frame: {e}"),
        }),
    }
}

/// Translates the inner `event` of an Events API callback.
///
/// An error means a known event type carried fields of the wrong shape.
pub fn translate_callback(inner: Value) -> Result<Option<CanonicalEvent>, serde_json::Error> {
    SlackEvent::decode(inner).map(classify)
}

fn classify(event: SlackEvent) -> Option<CanonicalEvent> {
    match event {
        SlackEvent::Message(msg) => {
            if msg.is_ignored_subtype() {
                trace!(subtype = ?msg.subtype, channel = %msg.channel, "Ignoring message subtype");
                return None;
            }
            let raw = msg.raw();
            Some(CanonicalEvent::IncomingMessage(IncomingMessage {
                channel: msg.channel,
                author: msg.user,
                id: msg.ts,
                text: msg.text,
                raw,
            }))
        }

        SlackEvent::ReactionAdded(reaction) => {
            if reaction.item.kind != "message" {
                trace!(item_type = %reaction.item.kind, "Ignoring reaction on non-message item");
                return None;
            }
            let raw = reaction.raw();
            Some(CanonicalEvent::ReactionAdded(ReactionAdded {
                channel: reaction.item.channel,
                message_id: reaction.item.ts,
                author: reaction.user,
                shortcode: reaction.reaction,
                raw,
            }))
        }

        SlackEvent::UserTyping(typing) => Some(CanonicalEvent::UserTyping {
            channel: typing.channel,
            user: typing.user,
        }),

        SlackEvent::RtmError(err) => Some(CanonicalEvent::TransportError {
            code: Some(err.error.code),
            message: err.error.msg,
        }),

        SlackEvent::Unknown { tag, payload } => Some(CanonicalEvent::Unrecognized { tag, payload }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::MessageEvent;

    fn incoming(event: Option<CanonicalEvent>) -> IncomingMessage {
        match event {
            Some(CanonicalEvent::IncomingMessage(msg)) => msg,
            other => panic!("expected IncomingMessage, got {other:?}"),
        }
    }

    #[test]
    fn test_rtm_message() {
        let frame = br#"{"type":"message","channel":"D023BB3L2","user":"","text":"Hello world","ts":"1360782400.498405"}"#;
        let msg = incoming(translate_rtm(frame));

        assert_eq!(msg.channel, "D023BB3L2");
        assert_eq!(msg.text, "Hello world");
        assert_eq!(msg.id, "1360782400.498405");
        assert_eq!(msg.author, "");
    }

    #[test]
    fn test_transports_agree_on_messages() {
        let payload = json!({
            "type": "message",
            "channel": "C1H9RESGL",
            "user": "U2147483697",
            "text": "Hello world",
            "ts": "1355517523.000005",
            "thread_ts": "1355517500.000001",
            "edited": {"user": "U2147483697", "ts": "1355517536.000001"},
            "event_ts": "1355517523.000005",
            "icons": {"icon_emoji": ":robot_face:"}
        });

        let from_rtm = translate_rtm(payload.to_string().as_bytes());
        let mut callback = payload;
        callback["channel_type"] = json!("channel");
        let from_callback = translate_callback(callback).unwrap();

        assert_eq!(from_rtm, from_callback);

        let raw: MessageEvent = serde_json::from_value(incoming(from_rtm).raw).unwrap();
        assert_eq!(raw.thread_ts.as_deref(), Some("1355517500.000001"));
        assert_eq!(raw.icons.unwrap().icon_emoji.as_deref(), Some(":robot_face:"));
    }

    #[test]
    fn test_app_mention_is_a_message() {
        let msg = incoming(
            translate_callback(json!({
                "type": "app_mention",
                "channel": "C1",
                "user": "U1",
                "text": "<@U0> ping",
                "ts": "1.1"
            }))
            .unwrap(),
        );
        assert_eq!(msg.text, "<@U0> ping");
        assert_eq!(msg.raw["type"], "app_mention");
    }

    #[test]
    fn test_edits_and_deletes_are_dropped() {
        for subtype in ["message_changed", "message_deleted"] {
            let frame = json!({"type": "message", "subtype": subtype, "channel": "C1", "ts": "1.1"});
            assert_eq!(translate_rtm(frame.to_string().as_bytes()), None);
        }
    }

    #[test]
    fn test_reactions_only_on_messages() {
        let on_file = json!({
            "type": "reaction_added",
            "user": "U1",
            "reaction": "thumbsup",
            "item": {"type": "file", "channel": "C1", "ts": "1.1"}
        });
        assert_eq!(translate_callback(on_file).unwrap(), None);

        let on_message = json!({
            "type": "reaction_added",
            "user": "U1",
            "item_user": "U2",
            "reaction": "thumbsup",
            "item": {"type": "message", "channel": "C1", "ts": "1.1"}
        });
        match translate_callback(on_message).unwrap() {
            Some(CanonicalEvent::ReactionAdded(r)) => {
                assert_eq!(r.channel, "C1");
                assert_eq!(r.message_id, "1.1");
                assert_eq!(r.author, "U1");
                assert_eq!(r.shortcode, "thumbsup");
            }
            other => panic!("expected ReactionAdded, got {other:?}"),
        }
    }

    #[test]
    fn test_user_typing() {
        assert_eq!(
            translate_rtm(br#"{"type":"user_typing","channel":"C1","user":"U1"}"#),
            Some(CanonicalEvent::UserTyping {
                channel: "C1".into(),
                user: "U1".into()
            })
        );
    }

    #[test]
    fn test_rtm_error_frame() {
        assert_eq!(
            translate_rtm(br#"{"type":"error","error":{"code":2,"msg":"message text is missing"}}"#),
            Some(CanonicalEvent::TransportError {
                code: Some(2),
                message: "message text is missing".into()
            })
        );
    }

    #[test]
    fn test_undecodable_frames() {
        for frame in [&b"not json"[..], br#"{"type":"message","text":7}"#] {
            match translate_rtm(frame) {
                Some(CanonicalEvent::TransportError { code: None, message }) => {
                    assert!(message.starts_with("failed to decode RTM frame"));
                }
                other => panic!("expected TransportError, got {other:?}"),
            }
        }

        assert!(translate_callback(json!({"type": "user_typing", "user": []})).is_err());
    }

    #[test]
    fn test_unknown_types_are_kept() {
        let payload = json!({"type": "presence_change", "user": "U1", "presence": "away"});
        assert_eq!(
            translate_callback(payload.clone()).unwrap(),
            Some(CanonicalEvent::Unrecognized {
                tag: "presence_change".into(),
                payload
            })
        );
    }
}
