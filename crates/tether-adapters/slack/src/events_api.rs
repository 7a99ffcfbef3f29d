//! Events API request handler.
//!
//! Slack delivers events as HTTP `POST`s to the configured callback path.
//! Every request goes through the same steps:
//!
//! 1. When a signing secret is configured, `X-Slack-Signature` must be a
//!    valid HMAC-SHA256 over `v0:{timestamp}:{body}` and
//!    `X-Slack-Request-Timestamp` must be recent.
//! 2. The body must parse as an envelope.
//! 3. The envelope `token` must equal the verification token. The check is
//!    skipped when a signing secret is set and no verification token is.
//! 4. The envelope is answered by type: `url_verification` echoes the
//!    challenge, `event_callback` is translated and pushed into the funnel,
//!    anything else is logged.
//!
//! Anything that fails along the way is answered with `500` and dropped.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tether_core::{FunnelSender, HttpRequest, HttpResponse, RequestHandler};
use tracing::{debug, error, info, trace, warn};

use crate::model::{EnvelopeType, EventsApiEnvelope};
use crate::translate::translate_callback;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Header carrying the signed timestamp.
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Oldest signed request that is still accepted.
pub const MAX_TIMESTAMP_SKEW: Duration = Duration::from_secs(5 * 60);

/// Answers Events API callbacks and feeds the funnel.
pub struct EventsApiHandler {
    name: String,
    verification_token: String,
    signing_secret: Option<String>,
    funnel: FunnelSender,
}

impl EventsApiHandler {
    /// Creates a handler that checks envelopes against `verification_token`.
    pub fn new(
        name: impl Into<String>,
        verification_token: impl Into<String>,
        funnel: FunnelSender,
    ) -> Self {
        Self {
            name: name.into(),
            verification_token: verification_token.into(),
            signing_secret: None,
            funnel,
        }
    }

    /// Enables signature verification. Empty secrets are ignored.
    pub fn with_signing_secret(mut self, secret: Option<String>) -> Self {
        self.signing_secret = secret.filter(|s| !s.is_empty());
        self
    }

    fn check_signature(&self, secret: &str, request: &HttpRequest) -> Result<(), &'static str> {
        let signature = request
            .header(SIGNATURE_HEADER)
            .ok_or("missing signature header")?;
        let timestamp = request
            .header(TIMESTAMP_HEADER)
            .ok_or("missing timestamp header")?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        verify_signature(secret, timestamp, signature, &request.body, now)
    }

    fn token_matches(&self, envelope: &EventsApiEnvelope) -> bool {
        if self.signing_secret.is_some() && self.verification_token.is_empty() {
            return true;
        }
        constant_time_eq(&envelope.token, &self.verification_token)
    }

    async fn handle_callback(&self, envelope: EventsApiEnvelope) -> HttpResponse {
        let Some(inner) = envelope.event else {
            error!(connection = %self.name, "Event callback without an event");
            return HttpResponse::internal_error("missing event");
        };

        let event = match translate_callback(inner) {
            Ok(Some(event)) => event,
            Ok(None) => return HttpResponse::ok(),
            Err(e) => {
                error!(connection = %self.name, error = %e, "Failed to decode callback event");
                return HttpResponse::internal_error("malformed event");
            }
        };

        trace!(connection = %self.name, kind = event.kind(), "Events API event");
        match self.funnel.push(event).await {
            Ok(()) => HttpResponse::ok(),
            Err(e) => {
                debug!(connection = %self.name, error = %e, "Dropping callback event");
                HttpResponse::internal_error("adapter is closed")
            }
        }
    }
}

#[async_trait]
impl RequestHandler for EventsApiHandler {
    async fn handle(&self, request: HttpRequest) -> HttpResponse {
        if let Some(secret) = &self.signing_secret
            && let Err(reason) = self.check_signature(secret, &request)
        {
            warn!(connection = %self.name, reason, remote_addr = ?request.remote_addr, "Rejected Events API request");
            return HttpResponse::internal_error("verification failed");
        }

        let envelope: EventsApiEnvelope = match serde_json::from_slice(&request.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(connection = %self.name, error = %e, "Failed to parse Events API request");
                return HttpResponse::internal_error("malformed request");
            }
        };

        if !self.token_matches(&envelope) {
            warn!(connection = %self.name, remote_addr = ?request.remote_addr, "Verification token mismatch");
            return HttpResponse::internal_error("verification failed");
        }

        match envelope.envelope_type() {
            EnvelopeType::UrlVerification => {
                info!(connection = %self.name, "Received URL verification challenge request");
                HttpResponse::text(200, envelope.challenge.unwrap_or_default())
            }
            EnvelopeType::EventCallback => self.handle_callback(envelope).await,
            EnvelopeType::Other => {
                error!(connection = %self.name, event_type = %envelope.kind, "Received unknown top level event type");
                HttpResponse::ok()
            }
        }
    }
}

/// Checks a `v0` request signature.
///
/// `now` and `timestamp` are seconds since the Unix epoch.
pub fn verify_signature(
    secret: &str,
    timestamp: &str,
    signature: &str,
    body: &[u8],
    now: u64,
) -> Result<(), &'static str> {
    let sent_at: u64 = timestamp
        .trim()
        .parse()
        .map_err(|_| "invalid request timestamp")?;
    if now.abs_diff(sent_at) > MAX_TIMESTAMP_SKEW.as_secs() {
        return Err("request timestamp outside allowed skew");
    }

    let digest_hex = signature
        .strip_prefix("v0=")
        .ok_or("signature must use v0=<hex> format")?;
    let expected = hex::decode(digest_hex.trim()).map_err(|_| "signature digest is not hex")?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "invalid signing secret")?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| "signature mismatch")
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tether_core::testing::LogCapture;
    use tether_core::{
        CanonicalEvent, ExtraRoute, FunnelReceiver, HttpServerCapability, ListenConfig, funnel,
    };
    use tether_transport::HttpServerCapabilityImpl;
    use tracing::Level;

    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";

    fn handler() -> (EventsApiHandler, FunnelReceiver) {
        let (tx, rx) = funnel(8);
        (EventsApiHandler::new("events-api", "vt", tx), rx)
    }

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn sign(timestamp: &str, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("v0:{timestamp}:{body}").as_bytes());
        format!("v0={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn signed(body: &str, timestamp: u64) -> HttpRequest {
        let timestamp = timestamp.to_string();
        HttpRequest::post("/slack/events", body.as_bytes().to_vec())
            .with_header("X-Slack-Request-Timestamp", timestamp.clone())
            .with_header("X-Slack-Signature", sign(&timestamp, body))
    }

    fn callback(token: &str, event: serde_json::Value) -> Vec<u8> {
        json!({"token": token, "type": "event_callback", "team_id": "T1", "event": event})
            .to_string()
            .into_bytes()
    }

    #[tokio::test]
    async fn test_url_verification() {
        let (handler, _rx) = handler();
        let body = r#"{"token":"vt","type":"url_verification","challenge":"abc123"}"#;

        let resp = handler.handle(HttpRequest::post("/slack/events", body)).await;

        assert_eq!(resp, HttpResponse::text(200, "abc123"));
        assert_eq!(resp.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_callback_is_pushed() {
        let (handler, mut rx) = handler();
        let body = callback(
            "vt",
            json!({"type": "message", "channel": "C1", "user": "U1", "text": "hi", "ts": "1.1"}),
        );

        let resp = handler.handle(HttpRequest::post("/slack/events", body)).await;

        assert_eq!(resp.status, 200);
        assert!(matches!(
            rx.next().await,
            Some(CanonicalEvent::IncomingMessage(msg)) if msg.text == "hi" && msg.channel == "C1"
        ));
    }

    #[tokio::test]
    async fn test_ignored_callback_is_acknowledged() {
        let (handler, mut rx) = handler();
        let body = callback(
            "vt",
            json!({"type": "reaction_added", "user": "U1", "reaction": "+1",
                   "item": {"type": "file", "channel": "C1", "ts": "1.1"}}),
        );

        let resp = handler.handle(HttpRequest::post("/slack/events", body)).await;

        assert_eq!(resp.status, 200);
        drop(handler);
        assert_eq!(rx.next().await, None);
    }

    #[tokio::test]
    async fn test_malformed_requests_are_rejected() {
        let (handler, _rx) = handler();

        for body in [
            b"not json".to_vec(),
            br#"{"token":"vt"}"#.to_vec(),
            br#"{"token":"vt","type":"event_callback"}"#.to_vec(),
            callback("vt", json!({"type": "user_typing", "user": 7})),
        ] {
            let resp = handler.handle(HttpRequest::post("/slack/events", body)).await;
            assert_eq!(resp.status, 500);
        }
    }

    #[tokio::test]
    async fn test_wrong_token_is_rejected() {
        let (handler, mut rx) = handler();
        let body = callback("nope", json!({"type": "user_typing", "channel": "C1", "user": "U1"}));

        let resp = handler.handle(HttpRequest::post("/slack/events", body)).await;

        assert_eq!(resp.status, 500);
        drop(handler);
        assert_eq!(rx.next().await, None);
    }

    #[tokio::test]
    async fn test_unknown_top_level_type() {
        let logs = LogCapture::new();
        let _guard = logs.set_default();
        let (handler, _rx) = handler();

        let resp = handler
            .handle(HttpRequest::post(
                "/slack/events",
                r#"{"token":"vt","type":"app_rate_limited"}"#,
            ))
            .await;

        assert_eq!(resp.status, 200);
        assert!(logs.contains(Level::ERROR, "Received unknown top level event type"));
        assert!(logs.contains_any("app_rate_limited"));
    }

    #[tokio::test]
    async fn test_closed_funnel_is_an_error() {
        let (handler, _rx) = handler();
        handler.funnel.close();
        let body = callback("vt", json!({"type": "user_typing", "channel": "C1", "user": "U1"}));

        let resp = handler.handle(HttpRequest::post("/slack/events", body)).await;
        assert_eq!(resp.status, 500);
    }

    #[tokio::test]
    async fn test_signed_requests() {
        let (tx, _rx) = funnel(8);
        let handler =
            EventsApiHandler::new("events-api", "", tx).with_signing_secret(Some(SECRET.into()));
        let body = r#"{"token":"","type":"url_verification","challenge":"abc123"}"#;

        let ok = handler.handle(signed(body, now())).await;
        assert_eq!(ok.body_text(), "abc123");

        let unsigned = handler.handle(HttpRequest::post("/slack/events", body)).await;
        assert_eq!(unsigned.status, 500);

        let stale = handler.handle(signed(body, now() - 600)).await;
        assert_eq!(stale.status, 500);

        let tampered = signed(body, now());
        let tampered = HttpRequest {
            body: body.replace("abc123", "evil").into_bytes(),
            ..tampered
        };
        assert_eq!(handler.handle(tampered).await.status, 500);
    }

    #[tokio::test]
    async fn test_signing_secret_keeps_token_check_when_configured() {
        let (tx, _rx) = funnel(8);
        let handler =
            EventsApiHandler::new("events-api", "vt", tx).with_signing_secret(Some(SECRET.into()));
        let body = r#"{"token":"other","type":"url_verification","challenge":"abc123"}"#;

        assert_eq!(handler.handle(signed(body, now())).await.status, 500);
    }

    #[test]
    fn test_verify_signature() {
        let body = br#"{"type":"url_verification"}"#;
        let sig = sign("1531420618", r#"{"type":"url_verification"}"#);

        assert_eq!(verify_signature(SECRET, "1531420618", &sig, body, 1531420618), Ok(()));
        assert_eq!(
            verify_signature(SECRET, "1531420618", &sig, body, 1531420618 + 301),
            Err("request timestamp outside allowed skew")
        );
        assert_eq!(
            verify_signature(SECRET, "1531420618", "sha256=00", body, 1531420618),
            Err("signature must use v0=<hex> format")
        );
        assert_eq!(
            verify_signature(SECRET, "1531420618", "v0=zz", body, 1531420618),
            Err("signature digest is not hex")
        );
        assert_eq!(
            verify_signature("other", "1531420618", &sig, body, 1531420618),
            Err("signature mismatch")
        );
        assert_eq!(
            verify_signature(SECRET, "yesterday", &sig, body, 1531420618),
            Err("invalid request timestamp")
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("vt", "vt"));
        assert!(!constant_time_eq("vt", "vu"));
        assert!(!constant_time_eq("vt", "vtt"));
        assert!(constant_time_eq("", ""));
    }

    struct Health;

    #[async_trait]
    impl RequestHandler for Health {
        async fn handle(&self, _request: HttpRequest) -> HttpResponse {
            HttpResponse::text(200, "healthy")
        }
    }

    #[tokio::test]
    async fn test_served_over_http() {
        let (handler, _rx) = handler();
        let config = ListenConfig::new("127.0.0.1:0", "/slack/events")
            .with_route(ExtraRoute::new("/healthz", Arc::new(Health)));
        let listener = HttpServerCapabilityImpl::new()
            .listen(config, Arc::new(handler))
            .await
            .unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/slack/events"))
            .body(r#"{"token":"vt","type":"url_verification","challenge":"abc123"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(resp.text().await.unwrap(), "abc123");

        let health = client.get(format!("{base}/healthz")).send().await.unwrap();
        assert_eq!(health.text().await.unwrap(), "healthy");

        let garbage = client
            .post(format!("{base}/slack/events"))
            .body("{")
            .send()
            .await
            .unwrap();
        assert_eq!(garbage.status().as_u16(), 500);

        listener.shutdown().await.unwrap();
    }
}
