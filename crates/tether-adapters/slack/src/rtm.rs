//! Real Time Messaging connection handler.
//!
//! The websocket client capability owns the socket and the reconnect loop.
//! This handler supplies a fresh `rtm.connect` URL before each attempt and
//! turns frames and lifecycle callbacks into canonical events.

use std::sync::Arc;

use async_trait::async_trait;
use tether_core::{
    CanonicalEvent, ConnectionHandler, ConnectionInfo, DisconnectReason, FunnelSender,
    TransportError, TransportResult,
};
use tracing::{debug, error, info, trace, warn};

use crate::api::SlackApi;
use crate::translate::translate_rtm;

/// `rtm.connect` errors that no amount of reconnecting will fix.
pub const AUTH_ERRORS: [&str; 4] = [
    "invalid_auth",
    "not_authed",
    "account_inactive",
    "token_revoked",
];

/// Feeds one RTM connection into the funnel.
pub struct RtmHandler {
    name: String,
    api: Arc<dyn SlackApi>,
    funnel: FunnelSender,
}

impl RtmHandler {
    /// Creates a handler for the connection called `name`.
    pub fn new(name: impl Into<String>, api: Arc<dyn SlackApi>, funnel: FunnelSender) -> Self {
        Self {
            name: name.into(),
            api,
            funnel,
        }
    }

    async fn push(&self, event: CanonicalEvent) {
        let kind = event.kind();
        if self.funnel.push(event).await.is_err() {
            trace!(connection = %self.name, kind, "Funnel closed, dropping RTM event");
        }
    }
}

#[async_trait]
impl ConnectionHandler for RtmHandler {
    async fn resolve_endpoint(&self) -> TransportResult<String> {
        match self.api.rtm_connect().await {
            Ok(response) => {
                debug!(connection = %self.name, "Obtained RTM websocket URL");
                Ok(response.url)
            }
            Err(e) => {
                if let Some(code) = e.code().filter(|c| AUTH_ERRORS.contains(c)) {
                    let reason = code.to_string();
                    error!(connection = %self.name, reason = %reason, "RTM connect rejected our token");
                    self.push(CanonicalEvent::AuthInvalidated {
                        reason: reason.clone(),
                    })
                    .await;
                    return Err(TransportError::AuthRejected { reason });
                }
                Err(TransportError::ConnectionFailed {
                    url: "rtm.connect".into(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn on_connect(&self, conn_info: ConnectionInfo) -> String {
        let conn_id = format!("{}-{}", self.name, uuid::Uuid::new_v4());
        info!(conn_id = %conn_id, protocol = %conn_info.protocol, "Connected to Slack RTM");
        conn_id
    }

    async fn on_message(&self, conn_id: &str, data: &[u8]) {
        match translate_rtm(data) {
            Some(event) => {
                trace!(conn_id = %conn_id, kind = event.kind(), "RTM event");
                self.push(event).await;
            }
            None => trace!(conn_id = %conn_id, "Dropped RTM frame"),
        }
    }

    async fn on_disconnect(&self, conn_id: &str, reason: DisconnectReason) {
        debug!(conn_id = %conn_id, intentional = reason.intentional, "RTM disconnected");
        self.push(CanonicalEvent::Disconnected {
            intentional: reason.intentional,
            cause: reason.cause,
        })
        .await;
    }

    async fn on_error(&self, conn_id: &str, error: &TransportError) {
        warn!(conn_id = %conn_id, error = %error, "RTM transport error");
    }
}
