//! Web API response bodies.
//!
//! Every response carries `ok`; failures carry `error` instead of the
//! fields below. The client checks `ok` before decoding into these types.

use serde::{Deserialize, Serialize};
use tether_core::Identity;

/// `auth.test`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTestResponse {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub team: String,
    /// The bot's user name.
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub team_id: String,
    /// The bot's user identifier.
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
}

/// `users.info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfoResponse {
    pub user: SlackUser,
}

/// A user object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub real_name: String,
}

impl From<SlackUser> for Identity {
    fn from(user: SlackUser) -> Self {
        Identity::new(user.id, user.name, user.real_name)
    }
}

/// `rtm.connect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtmConnectResponse {
    /// Single-use websocket URL.
    pub url: String,
}
