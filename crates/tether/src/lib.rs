//! # Tether
//!
//! A bridge between a chat platform and a bot "brain".
//!
//! ## Overview
//!
//! Tether receives platform events over one or more transports, reduces
//! them to a small canonical vocabulary, decides which of them the brain
//! should see, and hands the survivors to an event sink. In the other
//! direction it exposes `send` and `react` for the brain's replies.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐
//! │ Slack RTM  │──┐
//! └────────────┘  │   ┌────────┐   ┌───────────────┐   ┌──────┐   ┌───────┐
//!                 ├──▶│ Funnel │──▶│ Dispatch loop │──▶│ Sink │──▶│ Brain │
//! ┌────────────┐  │   └────────┘   └───────────────┘   └──────┘   └───┬───┘
//! │ Events API │──┘                                                   │
//! └────────────┘            send / react  ◀───────────────────────────┘
//! ```
//!
//! - **Runtime**: loads configuration, sets up logging and transports, owns
//!   the adapter lifecycle
//! - **Adapters**: platform implementations (Slack)
//! - **Transports**: websocket client, HTTP server and HTTP client
//!   capabilities
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tether::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = TetherRuntime::new();
//!     let slack = runtime.register_adapter::<SlackAdapter>().await?;
//!     let mut events = runtime.take_event_receiver().await.expect("receiver");
//!
//!     tokio::spawn(async move {
//!         while let Some(BrainEvent::ReceiveMessage(msg)) = events.recv().await {
//!             let _ = slack.send(&msg.text, &msg.channel).await;
//!         }
//!     });
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `slack`: Slack adapter (default)
//! - `toml-config` / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `ws-client`, `http-client`, `http-server`, `tls`: transport capabilities

pub use tether_core as core;
pub use tether_runtime as runtime;
pub use tether_transport as transport;

#[cfg(feature = "slack")]
pub use tether_adapter_slack as slack;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tether::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use tether_runtime::{LoggingBuilder, TetherConfig, TetherRuntime};

    // Events the brain receives
    pub use tether_core::{BrainEvent, Identity, MessageRef, ReceivedMessage};

    // Adapter traits, for calling send/react and writing adapters
    pub use tether_core::{Adapter, AdapterContext, BuildContext, ConfigurableAdapter};

    // Sinks
    pub use tether_core::{BoxedSink, ChannelSink, EventSink};

    #[cfg(feature = "slack")]
    pub use tether_adapter_slack::{SlackAdapter, SlackConfig};
}
