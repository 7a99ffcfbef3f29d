//! Data models for the Slack APIs.
//!
//! - [`event`]: inner events shared by RTM frames and Events API callbacks
//! - [`envelope`]: the Events API outer envelope
//! - [`api`]: Web API responses

pub mod api;
pub mod envelope;
pub mod event;

pub use api::{AuthTestResponse, RtmConnectResponse, SlackUser, UserInfoResponse};
pub use envelope::{EventsApiEnvelope, EnvelopeType};
pub use event::{
    Edited, Icons, MessageEvent, ReactionAddedEvent, ReactionItem, RtmErrorBody, RtmErrorEvent,
    SlackEvent, UserTypingEvent,
};
