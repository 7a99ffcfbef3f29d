//! Per-adapter session state captured during the authentication handshake.

/// Who the bot is on the platform.
///
/// Built once when the adapter authenticates and shared read-only (behind an
/// `Arc`) with every component that needs to recognise the bot's own traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    own_user_id: String,
    own_display_name: String,
    mention_token: String,
    team: Option<String>,
    team_id: Option<String>,
}

impl SessionState {
    /// Creates session state for the given bot user.
    pub fn new(own_user_id: impl Into<String>, own_display_name: impl Into<String>) -> Self {
        let own_user_id = own_user_id.into();
        let mention_token = format!("<@{own_user_id}>");
        Self {
            own_user_id,
            own_display_name: own_display_name.into(),
            mention_token,
            team: None,
            team_id: None,
        }
    }

    /// Attaches the workspace the bot belongs to.
    pub fn with_team(mut self, team: impl Into<String>, team_id: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self.team_id = Some(team_id.into());
        self
    }

    /// The bot's own user identifier.
    pub fn own_user_id(&self) -> &str {
        &self.own_user_id
    }

    /// The bot's display name.
    pub fn own_display_name(&self) -> &str {
        &self.own_display_name
    }

    /// The token that addresses the bot inside message text, `<@UID>`.
    pub fn mention_token(&self) -> &str {
        &self.mention_token
    }

    /// Workspace name, if known.
    pub fn team(&self) -> Option<&str> {
        self.team.as_deref()
    }

    /// Workspace identifier, if known.
    pub fn team_id(&self) -> Option<&str> {
        self.team_id.as_deref()
    }

    /// Returns `true` if `user_id` is the bot itself.
    pub fn is_self(&self, user_id: &str) -> bool {
        user_id == self.own_user_id
    }
}
