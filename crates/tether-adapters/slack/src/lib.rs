//! # Tether Adapter for Slack
//!
//! This crate connects the Tether chat bridge to Slack.
//!
//! ## Overview
//!
//! Slack can deliver events over two transports, and the adapter can run
//! both at once:
//!
//! - the Real Time Messaging (RTM) websocket API,
//! - the Events API, where Slack `POST`s every event to a callback URL.
//!
//! Either way the payload is translated into the same canonical events and
//! pushed into one funnel. Outbound calls (`send`, `react`) and identity
//! lookups go through the Web API.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tether_runtime::TetherRuntime;
//! use tether_adapter_slack::SlackAdapter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = TetherRuntime::new();
//!     let slack = runtime.register_adapter::<SlackAdapter>().await?;
//!     let mut events = runtime.take_event_receiver().await.expect("receiver");
//!     runtime.start().await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let Some(msg) = event.as_message() {
//!             slack.send(&msg.text, &msg.channel).await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Event Translation
//!
//! ```text
//! SlackEvent
//! ├── Message        -> IncomingMessage   (edits and deletes are dropped)
//! ├── ReactionAdded  -> ReactionAdded     (only reactions on messages)
//! ├── UserTyping     -> UserTyping
//! ├── RtmError       -> TransportError
//! └── Unknown        -> Unrecognized
//! ```
//!
//! The original message payload is kept and can be recovered with
//! [`ReceivedMessage::raw_as`](tether_core::ReceivedMessage::raw_as):
//!
//! ```rust,ignore
//! let slack_msg: tether_adapter_slack::MessageEvent = msg.raw_as()?;
//! println!("thread: {:?}", slack_msg.thread_ts);
//! ```

pub mod adapter;
pub mod api;
pub mod config;
pub mod events_api;
pub mod model;
pub mod rtm;
pub mod translate;

#[cfg(test)]
mod testing;

pub use adapter::{SlackAdapter, SlackAdapterBuilder};
pub use api::{ApiUserLookup, SlackApi, WebApiClient};
pub use config::{
    ConnectionConfig, DEFAULT_API_URL, EventsApiConfig, MessageParams, RtmConfig, SlackConfig,
};
pub use events_api::{EventsApiHandler, verify_signature};
pub use model::*;
pub use rtm::RtmHandler;
pub use translate::{translate_callback, translate_rtm};
