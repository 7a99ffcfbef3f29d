//! HTTP client capability implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, trace};

use tether_core::{HttpClientCapability, TransportError, TransportResult};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client capability implementation.
#[derive(Debug, Clone)]
pub struct HttpClientCapabilityImpl {
    client: Client,
}

impl HttpClientCapabilityImpl {
    /// Creates a new HTTP client capability with the default timeout.
    pub fn new() -> TransportResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates with custom timeout.
    pub fn with_timeout(timeout: Duration) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn execute(&self, url: &str, request: RequestBuilder) -> TransportResult<Value> {
        let resp = request.send().await.map_err(|e| TransportError::ConnectionFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        trace!(url = %url, status = status.as_u16(), "HTTP response");

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(url = %url, status = status.as_u16(), "HTTP request failed");
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }

        resp.json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

fn authorize(request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

#[async_trait]
impl HttpClientCapability for HttpClientCapabilityImpl {
    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> TransportResult<Value> {
        let request = authorize(self.client.post(url).json(body), bearer);
        self.execute(url, request).await
    }

    async fn post_params(
        &self,
        url: &str,
        bearer: Option<&str>,
        params: &[(&str, &str)],
    ) -> TransportResult<Value> {
        let mut target = Url::parse(url)
            .map_err(|e| TransportError::InvalidConfig(format!("invalid URL '{url}': {e}")))?;
        if !params.is_empty() {
            target.query_pairs_mut().extend_pairs(params.iter());
        }

        let request = authorize(self.client.post(target), bearer);
        self.execute(url, request).await
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_post_json_sends_body_and_bearer() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat.postMessage")
                    .header("authorization", "Bearer xoxb-test")
                    .json_body(json!({"channel": "C1", "text": "hi"}));
                then.status(200).json_body(json!({"ok": true, "ts": "1.2"}));
            })
            .await;

        let client = HttpClientCapabilityImpl::new().unwrap();
        let value = client
            .post_json(
                &server.url("/api/chat.postMessage"),
                Some("xoxb-test"),
                &json!({"channel": "C1", "text": "hi"}),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(value, json!({"ok": true, "ts": "1.2"}));
    }

    #[tokio::test]
    async fn test_post_params_encodes_query() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/users.info")
                    .query_param("user", "U 1&2");
                then.status(200).json_body(json!({"ok": true}));
            })
            .await;

        let client = HttpClientCapabilityImpl::new().unwrap();
        client
            .post_params(&server.url("/api/users.info"), None, &[("user", "U 1&2")])
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/auth.test");
                then.status(503).body("down");
            })
            .await;

        let client = HttpClientCapabilityImpl::new().unwrap();
        let err = client
            .post_params(&server.url("/api/auth.test"), None, &[])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::Http {
                status: 503,
                body: "down".into()
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/auth.test");
                then.status(200).body("<html>");
            })
            .await;

        let client = HttpClientCapabilityImpl::new().unwrap();
        let err = client
            .post_params(&server.url("/api/auth.test"), None, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[tokio::test]
    async fn test_bad_url_is_config_error() {
        let client = HttpClientCapabilityImpl::new().unwrap();
        let err = client.post_params("not a url", None, &[]).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidConfig(_)));
    }
}
