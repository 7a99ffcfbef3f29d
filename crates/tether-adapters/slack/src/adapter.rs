//! Slack adapter for the Tether chat bridge.
//!
//! The adapter authenticates once at construction (`auth.test`), then runs
//! any number of transports into a single funnel:
//!
//! - **RTM**: a websocket per `rtm` connection, through the runtime's
//!   websocket client capability.
//! - **Events API**: an HTTP listener per `events-api` connection, through
//!   the runtime's HTTP server capability.
//!
//! One dispatch loop drains the funnel into the sink handed over in
//! [`Adapter::on_start`].
//!
//! # Configuration-Based Usage (Recommended)
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
//!
//! ```rust,ignore
//! use tether_runtime::TetherRuntime;
//! use tether_adapter_slack::SlackAdapter;
//!
//! let runtime = TetherRuntime::new();
//! let slack = runtime.register_adapter::<SlackAdapter>().await?;
//! runtime.run().await?;
//! ```
//!
//! # Programmatic Usage
//!
//! ```rust,ignore
//! let slack = SlackAdapter::builder("xoxb-...")
//!     .with_listen_passive(true)
//!     .with_connection(ConnectionConfig::Rtm(RtmConfig::default()))
//!     .build(&BuildContext::new(transport))
//!     .await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tether_core::{
    Adapter, AdapterContext, AdapterError, AdapterResult, Addressing, AddressingPolicy, ApiError,
    ApiResult, BuildContext, ConfigurableAdapter, ConnectionHandle, DispatchLoop, ExitReason,
    ExtraRoute, FunnelReceiver, FunnelSender, ListenerHandle, MessageRef, SessionState,
    TransportContext, TransportError, UserDirectory, funnel,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{ApiUserLookup, SlackApi, WebApiClient};
use crate::config::{ConnectionConfig, EventsApiConfig, MessageParams, RtmConfig, SlackConfig};
use crate::events_api::EventsApiHandler;
use crate::rtm::RtmHandler;

/// How long `close` waits for each RTM connection to wind down.
const CONNECTION_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `close` waits for the dispatch loop to drain the funnel.
const DISPATCH_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// The Slack adapter.
pub struct SlackAdapter {
    config: SlackConfig,
    routes: Vec<ExtraRoute>,
    api: Arc<dyn SlackApi>,
    session: Arc<SessionState>,
    directory: Arc<UserDirectory>,
    funnel: FunnelSender,
    funnel_rx: Mutex<Option<FunnelReceiver>>,
    dispatch: Mutex<Option<JoinHandle<ExitReason>>>,
    connections: Mutex<Vec<ConnectionHandle>>,
    listeners: Mutex<Vec<ListenerHandle>>,
    closed: AtomicBool,
}

impl SlackAdapter {
    /// Creates an adapter builder for the given bot token.
    pub fn builder(token: impl Into<String>) -> SlackAdapterBuilder {
        SlackAdapterBuilder::new(token)
    }

    /// Returns the adapter configuration.
    pub fn config(&self) -> &SlackConfig {
        &self.config
    }

    /// Who the adapter is authenticated as.
    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// The identity cache used for typing events.
    pub fn directory(&self) -> &Arc<UserDirectory> {
        &self.directory
    }

    /// A producer handle for the adapter's funnel.
    pub fn funnel(&self) -> FunnelSender {
        self.funnel.clone()
    }

    /// Addresses the Events API listeners are bound to.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .lock()
            .iter()
            .filter_map(ListenerHandle::local_addr)
            .collect()
    }

    /// Returns `true` once [`Adapter::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn spawn_dispatch(&self, ctx: &AdapterContext) -> AdapterResult<()> {
        let rx = self.funnel_rx.lock().take();
        let Some(rx) = rx else {
            return Err(AdapterError::InvalidState("adapter already started".into()));
        };

        let addressing = Addressing::new(
            Arc::clone(&self.session),
            AddressingPolicy {
                listen_passive: self.config.listen_passive,
                ..Default::default()
            },
        );
        let task = DispatchLoop::new(
            rx,
            addressing,
            Arc::clone(&self.directory),
            Arc::clone(ctx.sink()),
        )
        .log_unknown_message_types(self.config.log_unknown_message_types)
        .spawn();

        *self.dispatch.lock() = Some(task);
        Ok(())
    }

    async fn start_connections(&self, transport: &TransportContext) -> AdapterResult<()> {
        let enabled_count = self.config.enabled_count();
        if enabled_count == 0 {
            warn!("No enabled connections in Slack adapter configuration");
            return Ok(());
        }

        info!(
            enabled = enabled_count,
            total = self.config.connections.len(),
            "Starting Slack adapter connections"
        );

        for conn_config in self.config.enabled_connections() {
            match conn_config {
                ConnectionConfig::Rtm(rtm) => self.start_rtm(transport, rtm).await?,
                ConnectionConfig::EventsApi(events) => {
                    self.start_events_api(transport, events).await?
                }
            }
        }

        Ok(())
    }

    async fn start_rtm(&self, transport: &TransportContext, rtm: &RtmConfig) -> AdapterResult<()> {
        let Some(ws_client) = transport.ws_client() else {
            warn!(name = %rtm.name, "WebSocket client capability not available, skipping rtm config");
            return Ok(());
        };

        info!(name = %rtm.name, auto_reconnect = rtm.auto_reconnect, "Connecting to Slack RTM");
        let handler = Arc::new(RtmHandler::new(
            &rtm.name,
            Arc::clone(&self.api),
            self.funnel.clone(),
        ));
        let handle = ws_client.connect(handler, rtm.client_config()).await?;
        self.connections.lock().push(handle);
        Ok(())
    }

    async fn start_events_api(
        &self,
        transport: &TransportContext,
        events: &EventsApiConfig,
    ) -> AdapterResult<()> {
        let Some(http_server) = transport.http_server() else {
            warn!(name = %events.name, "HTTP server capability not available, skipping events-api config");
            return Ok(());
        };

        let config = self
            .routes
            .iter()
            .cloned()
            .fold(events.listen_config(), |config, route| config.with_route(route));
        info!(
            name = %events.name,
            addr = %config.addr,
            path = %config.path,
            tls = config.tls.is_some(),
            "Starting Events API listener"
        );

        let handler = Arc::new(
            EventsApiHandler::new(
                &events.name,
                &self.config.verification_token,
                self.funnel.clone(),
            )
            .with_signing_secret(self.config.signing_secret.clone()),
        );
        let handle = http_server.listen(config, handler).await?;
        self.listeners.lock().push(handle);
        Ok(())
    }
}

#[async_trait]
impl Adapter for SlackAdapter {
    fn name() -> &'static str {
        "slack"
    }

    async fn on_start(&self, ctx: &mut AdapterContext) -> AdapterResult<()> {
        if self.is_closed() {
            return Err(AdapterError::InvalidState("adapter is closed".into()));
        }

        self.spawn_dispatch(ctx)?;

        if let Err(e) = self.start_connections(ctx.transport()).await {
            error!(error = %e, "Failed to start Slack adapter connections");
            if let Err(close_err) = self.close().await {
                warn!(error = %close_err, "Cleanup after failed start was incomplete");
            }
            return Err(e);
        }

        Ok(())
    }

    async fn send(&self, text: &str, channel: &str) -> ApiResult<()> {
        if self.is_closed() {
            return Err(ApiError::Closed);
        }

        info!(channel_id = %channel, "Sending message to channel");
        self.api
            .post_message(
                channel,
                text,
                &self.config.message_params,
                self.session.own_user_id(),
                &self.config.name,
            )
            .await
    }

    async fn react(&self, shortcode: &str, message: &MessageRef) -> ApiResult<()> {
        if self.is_closed() {
            return Err(ApiError::Closed);
        }

        debug!(channel_id = %message.channel, message_id = %message.id, shortcode, "Adding reaction");
        self.api
            .add_reaction(shortcode, &message.channel, &message.id)
            .await
    }

    async fn close(&self) -> AdapterResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Closing Slack adapter");

        let connections = std::mem::take(&mut *self.connections.lock());
        for conn in &connections {
            conn.close();
        }
        for conn in &connections {
            if tokio::time::timeout(CONNECTION_CLOSE_TIMEOUT, conn.closed())
                .await
                .is_err()
            {
                warn!(conn_id = %conn.id, "RTM connection did not close in time");
            }
        }

        let mut result = Ok(());
        let listeners = std::mem::take(&mut *self.listeners.lock());
        for listener in listeners {
            let id = listener.id.clone();
            if let Err(e) = listener.shutdown().await {
                warn!(listener = %id, error = %e, "Events API listener did not stop gracefully");
                result = Err(AdapterError::from(e));
            }
        }

        self.funnel.close();

        let dispatch = self.dispatch.lock().take();
        if let Some(task) = dispatch {
            match tokio::time::timeout(DISPATCH_STOP_TIMEOUT, task).await {
                Ok(Ok(reason)) => debug!(reason = ?reason, "Dispatch loop finished"),
                Ok(Err(e)) => warn!(error = %e, "Dispatch loop panicked"),
                Err(_) => warn!("Dispatch loop did not stop in time"),
            }
        }

        result
    }
}

#[async_trait]
impl ConfigurableAdapter for SlackAdapter {
    type Config = SlackConfig;

    async fn from_config(config: Self::Config, ctx: &BuildContext) -> AdapterResult<Arc<Self>> {
        SlackAdapterBuilder::from_config(config).build(ctx).await
    }
}

/// Builder for [`SlackAdapter`].
///
/// Allows programmatic construction of the adapter.
pub struct SlackAdapterBuilder {
    config: SlackConfig,
    connections: Option<Vec<ConnectionConfig>>,
    routes: Vec<ExtraRoute>,
    api: Option<Arc<dyn SlackApi>>,
    funnel_capacity: Option<usize>,
}

impl SlackAdapterBuilder {
    /// Starts from the default configuration with the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self::from_config(SlackConfig {
            token: token.into(),
            ..Default::default()
        })
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: SlackConfig) -> Self {
        Self {
            config,
            connections: None,
            routes: Vec::new(),
            api: None,
            funnel_capacity: None,
        }
    }

    /// Sets the Events API verification token.
    pub fn with_verification_token(mut self, token: impl Into<String>) -> Self {
        self.config.verification_token = token.into();
        self
    }

    /// Sets the Events API signing secret.
    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.signing_secret = Some(secret.into());
        self
    }

    /// Sets the username attached to outgoing messages.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Points the Web API client at another base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Accepts every channel message, not only mentions.
    pub fn with_listen_passive(mut self, enabled: bool) -> Self {
        self.config.listen_passive = enabled;
        self
    }

    /// Logs events the adapter has no rule for.
    pub fn with_log_unknown_message_types(mut self, enabled: bool) -> Self {
        self.config.log_unknown_message_types = enabled;
        self
    }

    /// Logs Web API traffic at debug level.
    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Sets the formatting options for outgoing messages.
    pub fn with_message_params(mut self, params: MessageParams) -> Self {
        self.config.message_params = params;
        self
    }

    /// Adds a connection. The first call replaces the configured list.
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connections.get_or_insert_with(Vec::new).push(connection);
        self
    }

    /// Serves extra routes next to every Events API callback path.
    pub fn with_routes(mut self, routes: impl IntoIterator<Item = ExtraRoute>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Uses the given Web API implementation instead of the HTTP client.
    pub fn with_api(mut self, api: Arc<dyn SlackApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Overrides the funnel capacity from the build context.
    pub fn with_funnel_capacity(mut self, capacity: usize) -> Self {
        self.funnel_capacity = Some(capacity);
        self
    }

    /// Authenticates and builds the adapter.
    ///
    /// Fails with [`AdapterError::AuthHandshake`] when `auth.test` fails.
    pub async fn build(self, ctx: &BuildContext) -> AdapterResult<Arc<SlackAdapter>> {
        let mut config = self.config;
        if let Some(connections) = self.connections {
            config.connections = connections;
        }
        config.validate()?;

        let api = match self.api {
            Some(api) => api,
            None => {
                let http = ctx.transport().http_client().ok_or(TransportError::NotAvailable {
                    transport: "http-client",
                })?;
                Arc::new(
                    WebApiClient::new(Arc::clone(http), &config.token)
                        .with_base_url(&config.api_url)
                        .with_debug(config.debug),
                ) as Arc<dyn SlackApi>
            }
        };

        let auth = api
            .auth_test()
            .await
            .map_err(|e| AdapterError::auth_handshake("slack", e))?;
        info!(
            url = %auth.url,
            user = %auth.user,
            user_id = %auth.user_id,
            team = %auth.team,
            team_id = %auth.team_id,
            "Connected to slack API"
        );

        let session =
            Arc::new(SessionState::new(&auth.user_id, &auth.user).with_team(&auth.team, &auth.team_id));
        let directory = Arc::new(UserDirectory::new(Arc::new(ApiUserLookup(Arc::clone(&api)))));
        let (tx, rx) = funnel(self.funnel_capacity.unwrap_or(ctx.funnel_capacity()));

        Ok(Arc::new(SlackAdapter {
            config,
            routes: self.routes,
            api,
            session,
            directory,
            funnel: tx,
            funnel_rx: Mutex::new(Some(rx)),
            dispatch: Mutex::new(None),
            connections: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }))
    }
}
