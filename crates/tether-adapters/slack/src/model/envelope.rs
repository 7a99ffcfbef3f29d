//! The Events API outer envelope.
//!
//! ```text
//! {"token": "...", "type": "url_verification", "challenge": "abc123"}
//! {"token": "...", "type": "event_callback", "team_id": "T1", "event": {...}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level envelope of an Events API request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsApiEnvelope {
    /// Verification token.
    #[serde(default)]
    pub token: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Present on `url_verification`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<i64>,
    /// Present on `event_callback`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<Value>,
}

/// Envelope types the adapter acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeType {
    UrlVerification,
    EventCallback,
    Other,
}

impl EventsApiEnvelope {
    /// Classifies the envelope by its `type`.
    pub fn envelope_type(&self) -> EnvelopeType {
        match self.kind.as_str() {
            "url_verification" => EnvelopeType::UrlVerification,
            "event_callback" => EnvelopeType::EventCallback,
            _ => EnvelopeType::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_challenge() {
        let envelope: EventsApiEnvelope = serde_json::from_str(
            r#"{"token":"vt","type":"url_verification","challenge":"abc123"}"#,
        )
        .unwrap();
        assert_eq!(envelope.envelope_type(), EnvelopeType::UrlVerification);
        assert_eq!(envelope.challenge.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_parse_callback() {
        let envelope: EventsApiEnvelope = serde_json::from_str(
            r#"{"token":"vt","type":"event_callback","event":{"type":"message"},"event_time":1}"#,
        )
        .unwrap();
        assert_eq!(envelope.envelope_type(), EnvelopeType::EventCallback);
        assert!(envelope.event.is_some());
    }

    #[test]
    fn test_missing_type_is_rejected() {
        assert!(serde_json::from_str::<EventsApiEnvelope>(r#"{"token":"vt"}"#).is_err());
    }
}
