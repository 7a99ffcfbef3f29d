//! Echo Bot Example
//!
//! A small brain for the Tether Slack bridge. Every message addressed to the
//! bot is answered in the same channel:
//!
//! - `ping` replies with `pong`
//! - `react <name>` adds the reaction `<name>` to the message
//! - anything else is echoed back
//!
//! Typing and reaction events are only logged.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --config tether.toml
//! ```
//!
//! A minimal `tether.toml`:
//!
//! ```toml
//! [adapters.slack]
//! token = "xoxb-..."
//! verification_token = "..."
//!
//! [[adapters.slack.connections]]
//! type = "events-api"
//! port = 3000
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tether::prelude::*;
use tether::runtime::ConfigLoader;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "Echoes Slack messages addressed to the bot")]
struct Args {
    /// Configuration file to load instead of searching the current directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `development` or `production`.
    #[arg(short, long)]
    profile: Option<String>,
}

/// What the bot says back to one message.
#[derive(Debug, PartialEq)]
enum Reply<'a> {
    Text(&'a str),
    React(&'a str),
}

fn reply_to(text: &str) -> Option<Reply<'_>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if text.eq_ignore_ascii_case("ping") {
        return Some(Reply::Text("pong"));
    }
    if let Some(name) = text.strip_prefix("react ") {
        return Some(Reply::React(name.trim().trim_matches(':')));
    }
    Some(Reply::Text(text))
}

async fn handle_events(slack: Arc<SlackAdapter>, mut events: UnboundedReceiver<BrainEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            BrainEvent::ReceiveMessage(msg) => {
                info!(channel = %msg.channel, author = %msg.author_id, "Received message");

                let result = match reply_to(&msg.text) {
                    Some(Reply::Text(text)) => slack.send(text, &msg.channel).await,
                    Some(Reply::React(name)) => slack.react(name, &msg.message_ref()).await,
                    None => Ok(()),
                };
                if let Err(e) = result {
                    error!(channel = %msg.channel, error = %e, "Failed to reply");
                }
            }
            BrainEvent::UserTyping { user, channel } => {
                info!(channel = %channel, user = %user.name, "User is typing");
            }
            BrainEvent::ReactionAdded {
                channel,
                message_id,
                author_id,
                shortcode,
            } => {
                info!(
                    channel = %channel,
                    message_id = %message_id,
                    author = %author_id,
                    shortcode = %shortcode,
                    "Reaction added"
                );
            }
        }
    }
    info!("Event stream closed");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new().with_current_dir();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile.clone());
    }
    let config = loader.load()?;

    // Logging must be set up before the runtime, which otherwise installs
    // its own subscriber without the adapter's debug directive.
    let slack_config: SlackConfig = match config.adapters.get("slack") {
        Some(value) => value.deserialize()?,
        None => SlackConfig::default(),
    };
    let mut logging = LoggingBuilder::from_config(&config.logging);
    if let Some(directive) = slack_config.log_directive() {
        logging = logging.directive(directive);
    }
    logging.init();

    let runtime = TetherRuntime::from_config(&config);
    let slack = runtime.register_adapter::<SlackAdapter>().await?;
    let Some(events) = runtime.take_event_receiver().await else {
        anyhow::bail!("event receiver was already taken");
    };

    let session = slack.session();
    info!(
        user = %session.own_display_name(),
        team = session.team().unwrap_or_default(),
        "Echo bot ready"
    );
    if slack.config().enabled_count() == 0 {
        warn!("No connections enabled, the bot will not receive anything");
    }

    let brain = tokio::spawn(handle_events(Arc::clone(&slack), events));

    runtime.run().await?;

    // Shutdown closed every funnel and released the runtime's sink, so the
    // stream ends once the last buffered event is handled.
    if let Err(e) = brain.await {
        error!(error = %e, "Event handler panicked");
    }

    Ok(())
}
