//! In-memory [`SlackApi`] for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tether_core::{ApiError, ApiResult, Identity};

use crate::api::SlackApi;
use crate::config::MessageParams;
use crate::model::{AuthTestResponse, RtmConnectResponse};

/// One recorded Web API call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    AuthTest,
    PostMessage {
        channel: String,
        text: String,
        params: MessageParams,
        user_id: String,
        username: String,
    },
    AddReaction {
        name: String,
        channel: String,
        ts: String,
    },
    UserInfo(String),
    RtmConnect,
}

#[derive(Default)]
pub(crate) struct FakeSlackApi {
    calls: Mutex<Vec<Call>>,
    auth_error: Mutex<Option<ApiError>>,
    rtm_error: Mutex<Option<ApiError>>,
    post_error: Mutex<Option<ApiError>>,
    user_error: Mutex<Option<ApiError>>,
}

impl FakeSlackApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_auth(&self, error: ApiError) {
        *self.auth_error.lock() = Some(error);
    }

    pub(crate) fn fail_rtm_connect(&self, error: ApiError) {
        *self.rtm_error.lock() = Some(error);
    }

    pub(crate) fn fail_post(&self, error: ApiError) {
        *self.post_error.lock() = Some(error);
    }

    pub(crate) fn fail_user_info(&self, error: ApiError) {
        *self.user_error.lock() = Some(error);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub(crate) fn user_info_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::UserInfo(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

fn outcome(slot: &Mutex<Option<ApiError>>) -> ApiResult<()> {
    match slot.lock().clone() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[async_trait]
impl SlackApi for FakeSlackApi {
    async fn auth_test(&self) -> ApiResult<AuthTestResponse> {
        self.record(Call::AuthTest);
        outcome(&self.auth_error)?;
        Ok(AuthTestResponse {
            url: "https://acme.slack.com/".into(),
            team: "Acme".into(),
            user: "tether".into(),
            team_id: "T1".into(),
            user_id: "UBOT".into(),
            bot_id: Some("B1".into()),
        })
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        params: &MessageParams,
        user_id: &str,
        username: &str,
    ) -> ApiResult<()> {
        self.record(Call::PostMessage {
            channel: channel.into(),
            text: text.into(),
            params: params.clone(),
            user_id: user_id.into(),
            username: username.into(),
        });
        outcome(&self.post_error)
    }

    async fn add_reaction(&self, name: &str, channel: &str, ts: &str) -> ApiResult<()> {
        self.record(Call::AddReaction {
            name: name.into(),
            channel: channel.into(),
            ts: ts.into(),
        });
        outcome(&self.post_error)
    }

    async fn user_info(&self, user: &str) -> ApiResult<Identity> {
        self.record(Call::UserInfo(user.into()));
        outcome(&self.user_error)?;
        Ok(Identity::new(user, "fgrosse", "Friedrich Große"))
    }

    async fn rtm_connect(&self) -> ApiResult<RtmConnectResponse> {
        self.record(Call::RtmConnect);
        outcome(&self.rtm_error)?;
        Ok(RtmConnectResponse {
            url: "ws://127.0.0.1:1/rtm".into(),
        })
    }
}
