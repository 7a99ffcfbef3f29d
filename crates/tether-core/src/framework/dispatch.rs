//! The dispatch loop: single consumer of the funnel.
//!
//! Events are handled strictly one at a time, in arrival order. Each
//! canonical variant has one rule:
//!
//! | event | action |
//! |---|---|
//! | `IncomingMessage` | addressing filter, then `ReceiveMessage` |
//! | `ReactionAdded` | drop self reactions, then `ReactionAdded` |
//! | `UserTyping` | resolve identity, then `UserTyping` |
//! | `TransportError` | log, continue |
//! | `AuthInvalidated` | log, stop |
//! | `Disconnected` (intentional) | stop |
//! | `Disconnected` (lost) | log, continue |
//! | `Unrecognized` | log if enabled, continue |
//!
//! Once stopped, the funnel is closed and whatever is still buffered is
//! discarded.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::foundation::event::{BrainEvent, CanonicalEvent, ReactionAdded};
use crate::foundation::sink::BoxedSink;
use crate::framework::addressing::{Addressing, Verdict};
use crate::framework::directory::UserDirectory;
use crate::framework::funnel::FunnelReceiver;

/// Why the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The funnel was closed and fully drained.
    FunnelClosed,
    /// The platform stopped accepting our credentials.
    AuthInvalidated(String),
    /// The streaming connection was closed on purpose.
    Disconnected,
}

/// State after handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchState {
    /// Keep going.
    Running,
    /// Terminal.
    Stopped(ExitReason),
}

/// Consumes the funnel and feeds the sink.
pub struct DispatchLoop {
    funnel: FunnelReceiver,
    addressing: Addressing,
    directory: Arc<UserDirectory>,
    sink: BoxedSink,
    log_unknown_message_types: bool,
}

impl DispatchLoop {
    /// Creates a dispatch loop.
    pub fn new(
        funnel: FunnelReceiver,
        addressing: Addressing,
        directory: Arc<UserDirectory>,
        sink: BoxedSink,
    ) -> Self {
        Self {
            funnel,
            addressing,
            directory,
            sink,
            log_unknown_message_types: false,
        }
    }

    /// Logs unrecognized event types at error level when enabled.
    pub fn log_unknown_message_types(mut self, enabled: bool) -> Self {
        self.log_unknown_message_types = enabled;
        self
    }

    /// Runs the loop on a new task.
    pub fn spawn(self) -> JoinHandle<ExitReason> {
        tokio::spawn(self.run())
    }

    /// Runs until the funnel ends or an event stops the loop.
    pub async fn run(mut self) -> ExitReason {
        debug!("Dispatch loop started");

        let reason = loop {
            let Some(event) = self.funnel.next().await else {
                break ExitReason::FunnelClosed;
            };
            if let DispatchState::Stopped(reason) = self.handle(event).await {
                break reason;
            }
        };

        let discarded = self.funnel.drain();
        if discarded > 0 {
            debug!(discarded, "Discarded events buffered after dispatch stopped");
        }
        info!(reason = ?reason, "Dispatch loop stopped");
        reason
    }

    /// Handles a single event.
    pub async fn handle(&self, event: CanonicalEvent) -> DispatchState {
        trace!(kind = event.kind(), "Dispatching event");

        match event {
            CanonicalEvent::IncomingMessage(message) => {
                match self.addressing.evaluate(message) {
                    Verdict::Forward(received) => {
                        self.sink.emit(BrainEvent::ReceiveMessage(received));
                    }
                    Verdict::SelfAuthored => trace!("Ignoring message from self"),
                    Verdict::NotAddressed => trace!("Ignoring message not addressed to us"),
                }
            }

            CanonicalEvent::ReactionAdded(ReactionAdded {
                channel,
                message_id,
                author,
                shortcode,
                ..
            }) => {
                if self.addressing.session().is_self(&author) {
                    trace!("Ignoring reaction from self");
                } else {
                    self.sink.emit(BrainEvent::ReactionAdded {
                        channel,
                        message_id,
                        author_id: author,
                        shortcode,
                    });
                }
            }

            CanonicalEvent::UserTyping { channel, user } => {
                let user = self.directory.resolve(&user).await;
                self.sink.emit(BrainEvent::UserTyping { user, channel });
            }

            CanonicalEvent::TransportError { code, message } => {
                error!(code = ?code, msg = %message, "Real Time Messaging (RTM) error");
            }

            CanonicalEvent::AuthInvalidated { reason } => {
                error!(reason = %reason, "Invalid authentication, stopping event dispatch");
                return DispatchState::Stopped(ExitReason::AuthInvalidated(reason));
            }

            CanonicalEvent::Disconnected {
                intentional: true, ..
            } => {
                debug!("Connection closed intentionally");
                return DispatchState::Stopped(ExitReason::Disconnected);
            }

            CanonicalEvent::Disconnected {
                intentional: false,
                cause,
            } => {
                warn!(cause = ?cause, "Connection lost, waiting for transport to reconnect");
            }

            CanonicalEvent::Unrecognized { tag, payload } => {
                if self.log_unknown_message_types {
                    error!(event_type = %tag, data = %payload, "Received unknown event type");
                }
            }
        }

        DispatchState::Running
    }
}
