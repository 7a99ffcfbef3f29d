//! Main runtime orchestration with capability-based transport system.
//!
//! The runtime builds adapters from their configuration sections, gives
//! them a TransportContext containing the available transport capabilities,
//! and wires every adapter's dispatch loop to one brain-facing sink.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tether_runtime::TetherRuntime;
//!
//! // Simplest way - auto-loads config from current directory
//! let runtime = TetherRuntime::new();
//! let slack = runtime.register_adapter::<SlackAdapter>().await?;
//! let mut events = runtime.take_event_receiver().await.unwrap();
//!
//! // Custom configuration path
//! let runtime = TetherRuntime::builder()
//!     .config_file("config/tether.toml")
//!     .build()?;
//! ```

use std::future::Future;
use std::sync::Arc;

use tether_core::{
    AdapterContext, BoxedAdapter, BoxedSink, BrainEvent, BuildContext, ChannelSink,
    ConfigurableAdapter, TransportContext,
};
use tokio::signal;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, TetherConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// The main Tether runtime that orchestrates adapters.
///
/// # Simple Usage
///
/// ```rust,ignore
/// use tether_runtime::TetherRuntime;
///
/// let runtime = TetherRuntime::new();
/// let slack = runtime.register_adapter::<SlackAdapter>().await?;
///
/// let mut events = runtime.take_event_receiver().await.unwrap();
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         // hand the event to the brain, reply through `slack`
///     }
/// });
///
/// runtime.run().await?;
/// ```
pub struct TetherRuntime {
    /// The configuration.
    config: TetherConfig,
    /// Registered adapters in registration order.
    adapters: RwLock<Vec<(String, BoxedAdapter)>>,
    /// Transport context.
    transport_context: TransportContext,
    /// Where every adapter's dispatch loop delivers accepted events.
    sink: RwLock<BoxedSink>,
    /// Receiving end of the default channel sink, until someone takes it.
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<BrainEvent>>>,
    /// Whether the runtime is running.
    running: RwLock<bool>,
}

impl TetherRuntime {
    /// Creates a new runtime with automatic configuration loading.
    ///
    /// This will:
    /// 1. Search for `tether.toml` / `tether.yaml` in the current directory
    /// 2. Initialize logging based on the configuration
    /// 3. Create transport context with all available capabilities
    ///
    /// If no configuration can be loaded, default settings are used.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                TetherConfig::default()
            });

        Self::from_config(&config)
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a new runtime from configuration.
    ///
    /// This initializes logging based on the configuration and creates
    /// a TransportContext with all available transport capabilities.
    pub fn from_config(config: &TetherConfig) -> Self {
        logging::init_from_config(&config.logging);

        Self::with_transport_context(config, Self::create_default_transport_context())
    }

    /// Creates a runtime with an explicit transport context.
    ///
    /// Logging is left untouched.
    pub fn with_transport_context(config: &TetherConfig, transport: TransportContext) -> Self {
        let (sink, event_rx) = ChannelSink::new();

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            funnel_capacity = config.runtime.funnel_capacity,
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            adapters: RwLock::new(Vec::new()),
            transport_context: transport,
            sink: RwLock::new(Arc::new(sink)),
            event_rx: Mutex::new(Some(event_rx)),
            running: RwLock::new(false),
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &TetherConfig {
        &self.config
    }

    /// Returns the transport capabilities handed to adapters.
    pub fn transport_context(&self) -> &TransportContext {
        &self.transport_context
    }

    /// Creates a default TransportContext with all available transport capabilities.
    ///
    /// Registers one implementation per enabled cargo feature.
    #[allow(unused_mut)]
    fn create_default_transport_context() -> TransportContext {
        let mut ctx = TransportContext::new();

        #[cfg(feature = "ws-client")]
        {
            use tether_transport::WsClientCapabilityImpl;
            ctx = ctx.with_ws_client(Arc::new(WsClientCapabilityImpl::new()));
            debug!("Registered WsClient capability");
        }

        #[cfg(feature = "http-server")]
        {
            use tether_transport::HttpServerCapabilityImpl;
            ctx = ctx.with_http_server(Arc::new(HttpServerCapabilityImpl::new()));
            debug!("Registered HttpServer capability");
        }

        #[cfg(feature = "http-client")]
        {
            use tether_transport::HttpClientCapabilityImpl;
            match HttpClientCapabilityImpl::new() {
                Ok(client) => {
                    ctx = ctx.with_http_client(Arc::new(client));
                    debug!("Registered HttpClient capability");
                }
                Err(e) => error!(error = %e, "Failed to build HTTP client, capability disabled"),
            }
        }

        ctx
    }

    /// Builds and registers an adapter.
    ///
    /// This will:
    /// 1. Look for configuration under `adapters.<name>` (from `A::name()`)
    /// 2. If found, deserialize it into `A::Config`
    /// 3. If not found, use `Default::default()`
    /// 4. Call `A::from_config` with the transport capabilities
    ///
    /// The adapter is returned so the caller can use it to send replies.
    ///
    /// ```rust,ignore
    /// let slack = runtime.register_adapter::<SlackAdapter>().await?;
    /// ```
    pub async fn register_adapter<A>(&self) -> RuntimeResult<Arc<A>>
    where
        A: ConfigurableAdapter + 'static,
    {
        let adapter_name = A::name();

        let config: A::Config = if let Some(config_value) = self.config.adapters.get(adapter_name)
        {
            config_value.deserialize().map_err(|e| {
                RuntimeError::AdapterConfigDeserialize(format!(
                    "Failed to deserialize config for adapter '{adapter_name}': {e}"
                ))
            })?
        } else {
            warn!(
                adapter = adapter_name,
                "No configuration found for adapter, using default"
            );
            Default::default()
        };

        let ctx = BuildContext::new(self.transport_context.clone())
            .with_funnel_capacity(self.config.runtime.funnel_capacity);
        debug!(
            adapter = adapter_name,
            funnel_capacity = ctx.funnel_capacity(),
            "Building adapter"
        );
        let adapter = A::from_config(config, &ctx).await?;

        let mut adapters = self.adapters.write().await;
        let boxed: BoxedAdapter = adapter.clone();
        if let Some(slot) = adapters.iter_mut().find(|(name, _)| name == adapter_name) {
            warn!(adapter = adapter_name, "Adapter already registered, replacing");
            slot.1 = boxed;
        } else {
            adapters.push((adapter_name.to_string(), boxed));
        }
        info!(adapter = adapter_name, "Registered adapter");
        Ok(adapter)
    }

    /// Returns the number of registered adapters.
    pub async fn adapter_count(&self) -> usize {
        self.adapters.read().await.len()
    }

    /// Takes the receiver of accepted events.
    ///
    /// Returns `None` if it was already taken or a custom sink was installed.
    pub async fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<BrainEvent>> {
        self.event_rx.lock().await.take()
    }

    /// Replaces the default channel sink.
    ///
    /// Only affects adapters started afterwards.
    pub async fn set_sink(&self, sink: BoxedSink) {
        *self.sink.write().await = sink;
        self.event_rx.lock().await.take();
    }

    /// Returns whether the runtime is currently running.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    fn adapter_context(&self, sink: &BoxedSink) -> AdapterContext {
        AdapterContext::new(self.transport_context.clone(), sink.clone())
    }

    /// Starts every registered adapter.
    ///
    /// If one adapter fails to start, those already started are shut down
    /// again and the failure is returned.
    pub async fn start(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                warn!("Runtime is already running");
                return Ok(());
            }
            *running = true;
        }

        info!("Starting Tether runtime");

        let sink = self.sink.read().await.clone();
        let adapters = self.adapters.read().await;

        for (index, (name, adapter)) in adapters.iter().enumerate() {
            let mut ctx = self.adapter_context(&sink);
            if let Err(source) = adapter.on_start(&mut ctx).await {
                error!(adapter = %name, error = %source, "Failed to start adapter");

                for (started, adapter) in adapters[..index].iter().rev() {
                    let mut ctx = self.adapter_context(&sink);
                    if let Err(e) = adapter.on_shutdown(&mut ctx).await {
                        error!(adapter = %started, error = %e, "Error during adapter shutdown");
                    }
                }
                *self.running.write().await = false;

                return Err(RuntimeError::AdapterStart {
                    name: name.clone(),
                    source,
                });
            }
            info!(adapter = %name, "Adapter started");
        }

        info!("Runtime started");

        Ok(())
    }

    /// Stops the runtime and all adapters.
    ///
    /// The event receiver ends once every adapter has drained its funnel.
    /// Events from adapters started after this are discarded unless a new
    /// sink is installed with [`set_sink`](Self::set_sink).
    pub async fn stop(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.write().await;
            if !*running {
                warn!("Runtime is not running");
                return Ok(());
            }
            *running = false;
        }

        info!("Stopping Tether runtime");

        let sink = self.sink.read().await.clone();
        let adapters = self.adapters.read().await;

        for (name, adapter) in adapters.iter() {
            let mut ctx = self.adapter_context(&sink);
            if let Err(e) = adapter.on_shutdown(&mut ctx).await {
                error!(adapter = %name, error = %e, "Error during adapter shutdown");
            }
        }

        // Dropping our sender lets the event receiver run dry once the
        // dispatch loops have released theirs.
        let discard: BoxedSink = Arc::new(|_event: BrainEvent| {});
        *self.sink.write().await = discard;
        debug!("Released the event sink");

        info!("Runtime stopped");

        Ok(())
    }

    /// Runs the runtime until a shutdown signal is received.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;

        info!("Tether runtime is now running. Press Ctrl+C to stop.");

        wait_for_shutdown().await;

        self.stop().await
    }

    /// Runs the runtime with a custom shutdown future.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;

        shutdown.await;

        self.stop().await
    }
}

impl Default for TetherRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler, waiting for Ctrl+C only");
                wait_for_ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
}

async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a `TetherRuntime` with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = TetherRuntime::builder()
///     .config_file("config/production.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile, e.g. `production` for `tether.production.toml`.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: TetherConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> RuntimeResult<TetherRuntime> {
        let config = self.config_loader.load()?;
        Ok(TetherRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
