//! Transport capability system.
//!
//! Adapters never open sockets themselves. They ask the [`TransportContext`]
//! for the capabilities they need and hand over a handler:
//!
//! ```rust,ignore
//! if let Some(ws_client) = ctx.transport().ws_client() {
//!     let handle = ws_client.connect(handler, ClientConfig::default()).await?;
//! }
//!
//! if let Some(http_server) = ctx.transport().http_server() {
//!     let handle = http_server.listen(ListenConfig::new("0.0.0.0:3000", "/slack/events"), handler).await?;
//! }
//! ```
//!
//! Which capabilities exist is decided by the cargo features the runtime was
//! built with.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::foundation::error::{TransportError, TransportResult};

// =============================================================================
// Connection Handler (streaming transports)
// =============================================================================

/// Why a streaming connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectReason {
    /// `true` when the local side asked for the disconnect.
    pub intentional: bool,
    /// What caused it, when known.
    pub cause: Option<String>,
}

impl DisconnectReason {
    /// A disconnect we asked for.
    pub fn intentional() -> Self {
        Self {
            intentional: true,
            cause: None,
        }
    }

    /// A disconnect we did not ask for.
    pub fn lost(cause: impl Into<String>) -> Self {
        Self {
            intentional: false,
            cause: Some(cause.into()),
        }
    }
}

/// A handler for streaming connection lifecycle events.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    /// Resolves the URL to connect to.
    ///
    /// Called before the first attempt and before every reconnect, because
    /// some platforms hand out single-use connection URLs. Returning
    /// [`TransportError::AuthRejected`] stops the client for good.
    async fn resolve_endpoint(&self) -> TransportResult<String>;

    /// Called when a connection is established.
    ///
    /// Returns an identifier for this connection, used in later callbacks.
    async fn on_connect(&self, conn_info: ConnectionInfo) -> String;

    /// Called for every data frame, in receipt order.
    ///
    /// The client does not read the next frame until this returns.
    async fn on_message(&self, conn_id: &str, data: &[u8]);

    /// Called when the connection ends, whether or not a reconnect follows.
    async fn on_disconnect(&self, conn_id: &str, reason: DisconnectReason);

    /// Called when a connection attempt or the connection itself fails.
    async fn on_error(&self, conn_id: &str, error: &TransportError);
}

/// Information about a connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Remote address (if available).
    pub remote_addr: Option<String>,
    /// Connection protocol (ws, http, etc.).
    pub protocol: String,
    /// Additional metadata.
    pub metadata: HashMap<String, String>,
}

impl ConnectionInfo {
    /// Creates new connection info.
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            remote_addr: None,
            protocol: protocol.into(),
            metadata: HashMap::new(),
        }
    }

    /// Adds metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Boxed connection handler.
pub type BoxedConnectionHandler = Arc<dyn ConnectionHandler>;

// =============================================================================
// Request Handler (callback transports)
// =============================================================================

/// An inbound HTTP request, already fully read.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    /// Request method, upper case.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Headers with lower-cased names.
    pub headers: HashMap<String, String>,
    /// Raw body.
    pub body: Vec<u8>,
    /// Peer address, if known.
    pub remote_addr: Option<String>,
}

impl HttpRequest {
    /// Creates a POST request with the given body.
    pub fn post(path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: "POST".into(),
            path: path.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    /// Adds a header. The name is lower-cased.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// The response to an [`HttpRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Content type, if any.
    pub content_type: Option<String>,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// `200 OK` with an empty body.
    pub fn ok() -> Self {
        Self {
            status: 200,
            content_type: None,
            body: Vec::new(),
        }
    }

    /// A plain-text response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("text/plain".into()),
            body: body.into().into_bytes(),
        }
    }

    /// `500 Internal Server Error` with a short reason.
    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self::text(500, reason)
    }

    /// Returns the body as UTF-8 text, lossily.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Handles requests arriving on an HTTP listener.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Produces the response for one request.
    async fn handle(&self, request: HttpRequest) -> HttpResponse;
}

/// Boxed request handler.
pub type BoxedRequestHandler = Arc<dyn RequestHandler>;

/// An additional route served next to the main callback path, e.g. a health
/// check.
#[derive(Clone)]
pub struct ExtraRoute {
    /// Path to serve.
    pub path: String,
    /// Handler for every method on that path.
    pub handler: BoxedRequestHandler,
}

impl ExtraRoute {
    /// Creates an extra route.
    pub fn new(path: impl Into<String>, handler: BoxedRequestHandler) -> Self {
        Self {
            path: path.into(),
            handler,
        }
    }
}

impl std::fmt::Debug for ExtraRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtraRoute")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// TLS material for an HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM certificate chain.
    pub cert_file: PathBuf,
    /// PEM private key.
    pub key_file: PathBuf,
}

/// How an HTTP listener should be set up.
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Bind address, `host:port`.
    pub addr: String,
    /// Path that receives `POST` callbacks.
    pub path: String,
    /// Serve over TLS when set.
    pub tls: Option<TlsConfig>,
    /// Limit for reading a request body.
    pub read_timeout: Duration,
    /// Limit for producing a response.
    pub write_timeout: Duration,
    /// Grace period for in-flight requests on shutdown.
    pub shutdown_timeout: Duration,
    /// Additional routes.
    pub extra_routes: Vec<ExtraRoute>,
}

impl ListenConfig {
    /// Creates a listen config with default timeouts.
    pub fn new(addr: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            path: path.into(),
            tls: None,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            extra_routes: Vec::new(),
        }
    }

    /// Enables TLS.
    pub fn with_tls(mut self, cert_file: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        self.tls = Some(TlsConfig {
            cert_file: cert_file.into(),
            key_file: key_file.into(),
        });
        self
    }

    /// Sets the read, write and shutdown timeouts.
    pub fn with_timeouts(mut self, read: Duration, write: Duration, shutdown: Duration) -> Self {
        self.read_timeout = read;
        self.write_timeout = write;
        self.shutdown_timeout = shutdown;
        self
    }

    /// Adds an extra route.
    pub fn with_route(mut self, route: ExtraRoute) -> Self {
        self.extra_routes.push(route);
        self
    }
}

// =============================================================================
// Transport Capabilities
// =============================================================================

/// WebSocket client capability.
///
/// Allows an adapter to hold a streaming connection to the platform.
#[async_trait]
pub trait WsClientCapability: Send + Sync {
    /// Starts a client connection.
    ///
    /// The endpoint is obtained from [`ConnectionHandler::resolve_endpoint`].
    /// The connection reconnects according to `config`. Fails only if the
    /// first attempt fails.
    async fn connect(
        &self,
        handler: BoxedConnectionHandler,
        config: ClientConfig,
    ) -> TransportResult<ConnectionHandle>;
}

/// HTTP server capability.
///
/// Allows an adapter to receive HTTP callbacks.
#[async_trait]
pub trait HttpServerCapability: Send + Sync {
    /// Starts an HTTP server.
    ///
    /// `handler` answers `POST` requests on `config.path`.
    async fn listen(
        &self,
        config: ListenConfig,
        handler: BoxedRequestHandler,
    ) -> TransportResult<ListenerHandle>;
}

/// HTTP client capability.
///
/// Allows an adapter to call a web API. Both methods return the decoded JSON
/// body of a successful response; non-2xx statuses become
/// [`TransportError::Http`].
#[async_trait]
pub trait HttpClientCapability: Send + Sync {
    /// Sends a POST with a JSON body.
    async fn post_json(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> TransportResult<serde_json::Value>;

    /// Sends a POST with arguments encoded in the query string.
    async fn post_params(
        &self,
        url: &str,
        bearer: Option<&str>,
        params: &[(&str, &str)],
    ) -> TransportResult<serde_json::Value>;
}

// =============================================================================
// Handles
// =============================================================================

/// Handle to a listener (server).
///
/// Dropping this handle signals the listener to stop without waiting.
#[derive(Debug)]
pub struct ListenerHandle {
    /// Unique identifier for this listener.
    pub id: String,
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl ListenerHandle {
    /// Creates a new listener handle.
    pub fn new(id: impl Into<String>, shutdown_tx: oneshot::Sender<()>) -> Self {
        Self {
            id: id.into(),
            local_addr: None,
            shutdown_tx: Some(shutdown_tx),
            task: None,
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    /// Records the bound address.
    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// Attaches the server task so shutdown can wait for it.
    pub fn with_task(mut self, task: JoinHandle<()>, shutdown_timeout: Duration) -> Self {
        self.task = Some(task);
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stops the listener and waits for in-flight requests.
    ///
    /// If the server has not finished within the shutdown timeout its task is
    /// aborted and [`TransportError::ConnectionClosed`] is returned.
    pub async fn shutdown(mut self) -> TransportResult<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let Some(mut task) = self.task.take() else {
            return Ok(());
        };
        match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
            Ok(_) => Ok(()),
            Err(_) => {
                warn!(id = %self.id, timeout = ?self.shutdown_timeout, "Graceful shutdown timed out, aborting listener");
                task.abort();
                Err(TransportError::ConnectionClosed {
                    reason: "graceful shutdown deadline exceeded".into(),
                })
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Handle to a client connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Unique identifier for this connection.
    pub id: String,
    shutdown_tx: Arc<watch::Sender<bool>>,
    finished: CancellationToken,
}

impl ConnectionHandle {
    /// Creates a new connection handle.
    ///
    /// `finished` must be cancelled by the connection task when it exits.
    pub fn new(
        id: impl Into<String>,
        shutdown_tx: watch::Sender<bool>,
        finished: CancellationToken,
    ) -> Self {
        Self {
            id: id.into(),
            shutdown_tx: Arc::new(shutdown_tx),
            finished,
        }
    }

    /// Asks the connection to close. Does not wait.
    pub fn close(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Waits until the connection task has exited.
    pub async fn closed(&self) {
        self.finished.cancelled().await;
    }

    /// Returns `true` once the connection task has exited.
    pub fn is_finished(&self) -> bool {
        self.finished.is_cancelled()
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for client connections.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Whether to automatically reconnect on disconnect.
    pub auto_reconnect: bool,
    /// Maximum number of consecutive reconnection attempts (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay between reconnection attempts.
    pub initial_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// Ping interval, if the client should keep the connection alive itself.
    pub heartbeat_interval: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            max_retries: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            heartbeat_interval: Some(Duration::from_secs(30)),
        }
    }
}

impl ClientConfig {
    /// Creates a new client config with auto-reconnect disabled.
    pub fn no_reconnect() -> Self {
        Self {
            auto_reconnect: false,
            ..Default::default()
        }
    }

    /// Sets the maximum retry count.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }

    /// Sets the reconnect delays.
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max.max(initial);
        self
    }

    /// Returns the delay that follows `current` under this backoff policy.
    pub fn next_delay(&self, current: Duration) -> Duration {
        std::cmp::min(
            Duration::from_secs_f64(current.as_secs_f64() * self.backoff_multiplier),
            self.max_delay,
        )
    }
}

// =============================================================================
// Transport Context
// =============================================================================

/// Context for adapter initialization.
///
/// Provides access to available transport capabilities.
#[derive(Clone, Default)]
pub struct TransportContext {
    ws_client: Option<Arc<dyn WsClientCapability>>,
    http_server: Option<Arc<dyn HttpServerCapability>>,
    http_client: Option<Arc<dyn HttpClientCapability>>,
}

impl TransportContext {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the WebSocket client capability.
    pub fn with_ws_client(mut self, cap: Arc<dyn WsClientCapability>) -> Self {
        self.ws_client = Some(cap);
        self
    }

    /// Registers the HTTP server capability.
    pub fn with_http_server(mut self, cap: Arc<dyn HttpServerCapability>) -> Self {
        self.http_server = Some(cap);
        self
    }

    /// Registers the HTTP client capability.
    pub fn with_http_client(mut self, cap: Arc<dyn HttpClientCapability>) -> Self {
        self.http_client = Some(cap);
        self
    }

    /// Gets the WebSocket client capability if available.
    pub fn ws_client(&self) -> Option<&Arc<dyn WsClientCapability>> {
        self.ws_client.as_ref()
    }

    /// Gets the HTTP server capability if available.
    pub fn http_server(&self) -> Option<&Arc<dyn HttpServerCapability>> {
        self.http_server.as_ref()
    }

    /// Gets the HTTP client capability if available.
    pub fn http_client(&self) -> Option<&Arc<dyn HttpClientCapability>> {
        self.http_client.as_ref()
    }

    /// Checks if WebSocket client is available.
    pub fn has_ws_client(&self) -> bool {
        self.ws_client.is_some()
    }

    /// Checks if HTTP server is available.
    pub fn has_http_server(&self) -> bool {
        self.http_server.is_some()
    }

    /// Checks if HTTP client is available.
    pub fn has_http_client(&self) -> bool {
        self.http_client.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_context() {
        let ctx = TransportContext::new();
        assert!(!ctx.has_ws_client());
        assert!(!ctx.has_http_server());
        assert!(!ctx.has_http_client());
    }

    #[test]
    fn test_client_config() {
        let config = ClientConfig::default();
        assert!(config.auto_reconnect);
        assert!(config.max_retries.is_none());

        let config = ClientConfig::no_reconnect();
        assert!(!config.auto_reconnect);
    }

    #[test]
    fn test_backoff_caps_at_max_delay() {
        let config =
            ClientConfig::default().with_delays(Duration::from_secs(1), Duration::from_secs(3));
        let second = config.next_delay(config.initial_delay);
        assert_eq!(second, Duration::from_secs(2));
        assert_eq!(config.next_delay(second), Duration::from_secs(3));
    }

    #[test]
    fn test_request_header_lookup_is_case_insensitive() {
        let req = HttpRequest::post("/events", b"{}".to_vec()).with_header("X-Slack-Signature", "v0=ab");
        assert_eq!(req.header("x-slack-signature"), Some("v0=ab"));
        assert_eq!(req.header("X-SLACK-SIGNATURE"), Some("v0=ab"));
    }

    #[tokio::test]
    async fn test_listener_shutdown_without_task() {
        let (tx, rx) = oneshot::channel();
        let handle = ListenerHandle::new("test", tx);
        handle.shutdown().await.unwrap();
        assert!(rx.await.is_ok());
    }

    #[tokio::test]
    async fn test_listener_shutdown_aborts_after_deadline() {
        let (tx, _rx) = oneshot::channel();
        let task = tokio::spawn(std::future::pending::<()>());
        let handle = ListenerHandle::new("stuck", tx).with_task(task, Duration::from_millis(20));
        let result = handle.shutdown().await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed { .. })));
    }

    #[tokio::test]
    async fn test_connection_handle_close_and_wait() {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let finished = CancellationToken::new();
        let handle = ConnectionHandle::new("c1", shutdown_tx, finished.clone());

        let task = tokio::spawn(async move {
            let _ = shutdown_rx.changed().await;
            finished.cancel();
        });

        handle.close();
        handle.closed().await;
        assert!(handle.is_finished());
        task.await.unwrap();
    }
}
