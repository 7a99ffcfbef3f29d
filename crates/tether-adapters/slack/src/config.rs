//! Configuration types for the Slack adapter.
//!
//! This module defines the configuration schema that is loaded from the
//! `[adapters.slack]` section of the global configuration file.
//!
//! # Example Configuration
//!
//! ```toml
//! [adapters.slack]
//! token = "xoxb-..."
//! name = "tether"
//! listen_passive = false
//!
//! # Streaming connection over the Real Time Messaging API
//! [[adapters.slack.connections]]
//! type = "rtm"
//! name = "primary"
//! reconnect_delay_ms = 1000
//!
//! # HTTP callbacks from the Events API
//! [[adapters.slack.connections]]
//! type = "events-api"
//! enabled = false
//! port = 3000
//! path = "/slack/events"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_core::{AdapterError, AdapterResult, ClientConfig, ListenConfig};

/// Default Slack Web API base URL.
pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// Slack adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Bot token used for every Web API call.
    pub token: String,

    /// Verification token compared against every Events API envelope.
    pub verification_token: String,

    /// Signing secret for `X-Slack-Signature` verification.
    pub signing_secret: Option<String>,

    /// Username attached to outgoing messages.
    pub name: String,

    /// Web API base URL.
    pub api_url: String,

    /// Accept every message in channels the bot is in, not just mentions.
    pub listen_passive: bool,

    /// Log event types the adapter has no rule for.
    pub log_unknown_message_types: bool,

    /// Log Web API traffic at debug level.
    pub debug: bool,

    /// Formatting options for outgoing messages.
    pub message_params: MessageParams,

    /// Transports to start.
    pub connections: Vec<ConnectionConfig>,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            verification_token: String::new(),
            signing_secret: None,
            name: "tether".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            listen_passive: false,
            log_unknown_message_types: false,
            debug: false,
            message_params: MessageParams::default(),
            connections: vec![ConnectionConfig::Rtm(RtmConfig::default())],
        }
    }
}

impl SlackConfig {
    /// Returns only the enabled connections.
    pub fn enabled_connections(&self) -> impl Iterator<Item = &ConnectionConfig> {
        self.connections.iter().filter(|c| c.is_enabled())
    }

    /// Returns the number of enabled connections.
    pub fn enabled_count(&self) -> usize {
        self.enabled_connections().count()
    }

    /// Filter directive that raises this crate's log level when `debug` is set.
    pub fn log_directive(&self) -> Option<&'static str> {
        self.debug.then_some("tether_adapter_slack=debug")
    }

    /// Checks the settings that cannot be checked by deserialization alone.
    pub fn validate(&self) -> AdapterResult<()> {
        if self.token.trim().is_empty() {
            return Err(AdapterError::internal("slack token is not configured"));
        }

        for conn in self.enabled_connections() {
            if let ConnectionConfig::EventsApi(events) = conn {
                let has_secret = self
                    .signing_secret
                    .as_deref()
                    .is_some_and(|s| !s.is_empty());
                if self.verification_token.is_empty() && !has_secret {
                    return Err(AdapterError::internal(format!(
                        "connection '{}' needs a verification_token or a signing_secret",
                        events.name
                    )));
                }
                if events.cert_file.is_some() != events.key_file.is_some() {
                    return Err(AdapterError::internal(format!(
                        "connection '{}' needs both cert_file and key_file for TLS",
                        events.name
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Message formatting defaults applied to `chat.postMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageParams {
    /// Link `@names` and `#channels`.
    pub link_names: u8,
    /// `full` or `none`.
    pub parse: String,
    /// Post as the authenticated user.
    pub as_user: bool,
    /// Unfurl text links.
    pub unfurl_links: bool,
    /// Unfurl media links.
    pub unfurl_media: bool,
}

impl Default for MessageParams {
    fn default() -> Self {
        Self {
            link_names: 1,
            parse: "full".to_string(),
            as_user: true,
            unfurl_links: false,
            unfurl_media: false,
        }
    }
}

/// Connection configuration for a single transport.
///
/// Uses tagged union with `type` field to determine the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConnectionConfig {
    /// Real Time Messaging websocket.
    Rtm(RtmConfig),

    /// Events API HTTP callbacks.
    EventsApi(EventsApiConfig),
}

impl ConnectionConfig {
    /// Returns the connection name.
    pub fn name(&self) -> &str {
        match self {
            ConnectionConfig::Rtm(c) => &c.name,
            ConnectionConfig::EventsApi(c) => &c.name,
        }
    }

    /// Returns whether this connection is enabled.
    pub fn is_enabled(&self) -> bool {
        match self {
            ConnectionConfig::Rtm(c) => c.enabled,
            ConnectionConfig::EventsApi(c) => c.enabled,
        }
    }
}

/// RTM connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RtmConfig {
    /// Connection name for identification.
    pub name: String,

    /// Whether this connection is enabled.
    pub enabled: bool,

    /// Whether to reconnect after the connection drops.
    pub auto_reconnect: bool,

    /// First reconnect delay in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Upper bound for the reconnect delay in milliseconds.
    pub max_reconnect_delay_ms: u64,

    /// Consecutive failed reconnects before giving up (unset = forever).
    pub max_retries: Option<u32>,
}

impl Default for RtmConfig {
    fn default() -> Self {
        Self {
            name: "rtm".to_string(),
            enabled: true,
            auto_reconnect: true,
            reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 60_000,
            max_retries: None,
        }
    }
}

impl RtmConfig {
    /// Builds the websocket client configuration.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig {
            auto_reconnect: self.auto_reconnect,
            ..Default::default()
        }
        .with_delays(
            Duration::from_millis(self.reconnect_delay_ms),
            Duration::from_millis(self.max_reconnect_delay_ms),
        );
        config.max_retries = self.max_retries;
        config
    }
}

/// Events API listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsApiConfig {
    /// Connection name for identification.
    pub name: String,

    /// Whether this connection is enabled.
    pub enabled: bool,

    /// Bind address (default: "0.0.0.0").
    pub host: String,

    /// Listen port (default: 3000).
    pub port: u16,

    /// Callback path (default: "/slack/events").
    pub path: String,

    /// PEM certificate chain; enables HTTPS together with `key_file`.
    pub cert_file: Option<PathBuf>,

    /// PEM private key.
    pub key_file: Option<PathBuf>,

    /// Request body read limit in milliseconds.
    pub read_timeout_ms: u64,

    /// Response write limit in milliseconds.
    pub write_timeout_ms: u64,

    /// Grace period for in-flight requests on close, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for EventsApiConfig {
    fn default() -> Self {
        Self {
            name: "events-api".to_string(),
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 3000,
            path: "/slack/events".to_string(),
            cert_file: None,
            key_file: None,
            read_timeout_ms: 10_000,
            write_timeout_ms: 10_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl EventsApiConfig {
    /// Returns the bind address string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the listener configuration, without extra routes.
    pub fn listen_config(&self) -> ListenConfig {
        let mut config = ListenConfig::new(self.bind_addr(), &self.path).with_timeouts(
            Duration::from_millis(self.read_timeout_ms),
            Duration::from_millis(self.write_timeout_ms),
            Duration::from_millis(self.shutdown_timeout_ms),
        );
        if let (Some(cert), Some(key)) = (&self.cert_file, &self.key_file) {
            config = config.with_tls(cert, key);
        }
        config
    }
}
