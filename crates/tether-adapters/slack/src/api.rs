//! Slack Web API access.
//!
//! [`SlackApi`] is the narrow set of Web API methods the adapter needs.
//! [`WebApiClient`] implements it on top of the runtime's
//! [`HttpClientCapability`]; tests substitute their own implementation.
//!
//! Every Web API response carries an `ok` flag. A response with
//! `"ok": false` becomes [`ApiError::Api`] with Slack's `error` code.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tether_core::{ApiError, ApiResult, HttpClientCapability, Identity, UserLookup};
use tracing::debug;

use crate::config::{DEFAULT_API_URL, MessageParams};
use crate::model::{AuthTestResponse, RtmConnectResponse, UserInfoResponse};

/// The Web API methods used by the adapter.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// `auth.test`: who the token belongs to.
    async fn auth_test(&self) -> ApiResult<AuthTestResponse>;

    /// `chat.postMessage`.
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        params: &MessageParams,
        user_id: &str,
        username: &str,
    ) -> ApiResult<()>;

    /// `reactions.add` on the message `ts` in `channel`.
    async fn add_reaction(&self, name: &str, channel: &str, ts: &str) -> ApiResult<()>;

    /// `users.info`.
    async fn user_info(&self, user: &str) -> ApiResult<Identity>;

    /// `rtm.connect`: a fresh websocket URL.
    async fn rtm_connect(&self) -> ApiResult<RtmConnectResponse>;
}

/// [`SlackApi`] over HTTPS.
pub struct WebApiClient {
    http: Arc<dyn HttpClientCapability>,
    base_url: String,
    token: String,
    debug: bool,
}

impl WebApiClient {
    /// Creates a client for the public Slack API.
    pub fn new(http: Arc<dyn HttpClientCapability>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
            debug: false,
        }
    }

    /// Points the client at another base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Logs every response status at debug level.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The base URL methods are appended to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call_params(&self, method: &str, params: &[(&str, &str)]) -> ApiResult<Value> {
        let response = self
            .http
            .post_params(&self.url(method), Some(&self.token), params)
            .await?;
        self.check(method, response)
    }

    async fn call_json(&self, method: &str, body: &Value) -> ApiResult<Value> {
        let response = self
            .http
            .post_json(&self.url(method), Some(&self.token), body)
            .await?;
        self.check(method, response)
    }

    fn check(&self, method: &str, response: Value) -> ApiResult<Value> {
        let ok = response.get("ok").and_then(Value::as_bool);
        if self.debug {
            // Bodies may echo message text, so only the outcome is logged.
            debug!(method, ok = ?ok, error = ?response.get("error"), "Slack API response");
        }

        match ok {
            Some(true) => Ok(response),
            Some(false) => {
                let error = response
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown_error");
                Err(ApiError::api(method, error))
            }
            None => Err(ApiError::invalid_response(method, "missing 'ok' field")),
        }
    }
}

fn decode<T: DeserializeOwned>(method: &str, response: Value) -> ApiResult<T> {
    serde_json::from_value(response).map_err(|e| ApiError::invalid_response(method, e.to_string()))
}

#[async_trait]
impl SlackApi for WebApiClient {
    async fn auth_test(&self) -> ApiResult<AuthTestResponse> {
        let response = self.call_params("auth.test", &[]).await?;
        decode("auth.test", response)
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        params: &MessageParams,
        user_id: &str,
        username: &str,
    ) -> ApiResult<()> {
        let body = json!({
            "channel": channel,
            "text": text,
            "user": user_id,
            "username": username,
            "link_names": params.link_names,
            "parse": params.parse,
            "as_user": params.as_user,
            "unfurl_links": params.unfurl_links,
            "unfurl_media": params.unfurl_media,
        });
        self.call_json("chat.postMessage", &body).await?;
        Ok(())
    }

    async fn add_reaction(&self, name: &str, channel: &str, ts: &str) -> ApiResult<()> {
        let body = json!({
            "name": name,
            "channel": channel,
            "timestamp": ts,
        });
        self.call_json("reactions.add", &body).await?;
        Ok(())
    }

    async fn user_info(&self, user: &str) -> ApiResult<Identity> {
        let response = self.call_params("users.info", &[("user", user)]).await?;
        let info: UserInfoResponse = decode("users.info", response)?;
        Ok(info.user.into())
    }

    async fn rtm_connect(&self) -> ApiResult<RtmConnectResponse> {
        let response = self.call_params("rtm.connect", &[]).await?;
        decode("rtm.connect", response)
    }
}

/// Resolves typing users through `users.info`.
pub struct ApiUserLookup(pub Arc<dyn SlackApi>);

#[async_trait]
impl UserLookup for ApiUserLookup {
    async fn lookup_user(&self, user_id: &str) -> ApiResult<Identity> {
        self.0.user_info(user_id).await
    }
}
