//! Adapter trait.
//!
//! An adapter bridges one chat platform to the brain. Inbound, it starts
//! transports from the [`TransportContext`] and feeds its dispatch loop,
//! which emits into the context's sink. Outbound, it is the gateway the
//! brain calls to post messages and reactions.
//!
//! ```rust,ignore
//! #[async_trait]
//! impl Adapter for MyAdapter {
//!     fn name() -> &'static str { "my-platform" }
//!
//!     async fn on_start(&self, ctx: &mut AdapterContext) -> AdapterResult<()> {
//!         if let Some(ws_client) = ctx.transport().ws_client() {
//!             self.connection = Some(ws_client.connect(self.handler(), ClientConfig::default()).await?);
//!         }
//!         self.spawn_dispatch(ctx.sink().clone());
//!         Ok(())
//!     }
//!     // send, react, close ...
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::foundation::error::{AdapterResult, ApiResult};
use crate::foundation::event::MessageRef;
use crate::foundation::sink::BoxedSink;
use crate::framework::funnel::DEFAULT_FUNNEL_CAPACITY;
use crate::integration::capability::TransportContext;

/// Context provided to adapters when they start and stop.
pub struct AdapterContext {
    transport: TransportContext,
    sink: BoxedSink,
}

impl AdapterContext {
    /// Creates a new adapter context.
    pub fn new(transport: TransportContext, sink: BoxedSink) -> Self {
        Self { transport, sink }
    }

    /// Returns a reference to the transport context.
    pub fn transport(&self) -> &TransportContext {
        &self.transport
    }

    /// Returns the sink accepted events should go to.
    pub fn sink(&self) -> &BoxedSink {
        &self.sink
    }
}

/// The core adapter trait.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Returns the adapter name (e.g., "slack").
    ///
    /// This name locates the adapter's section in the configuration:
    ///
    /// ```toml
    /// [adapters.slack]   # <- returned by Adapter::name()
    /// token = "xoxb-..."
    /// ```
    fn name() -> &'static str
    where
        Self: Sized;

    /// Starts the adapter's transports and dispatch loop.
    async fn on_start(&self, ctx: &mut AdapterContext) -> AdapterResult<()>;

    /// Called when the runtime is shutting down. Defaults to [`Adapter::close`].
    async fn on_shutdown(&self, _ctx: &mut AdapterContext) -> AdapterResult<()> {
        self.close().await
    }

    /// Posts `text` to `channel`.
    async fn send(&self, text: &str, channel: &str) -> ApiResult<()>;

    /// Adds the reaction `shortcode` to a message.
    async fn react(&self, shortcode: &str, message: &MessageRef) -> ApiResult<()>;

    /// Releases the adapter's transports and closes its funnel.
    ///
    /// Safe to call more than once; calls after the first do nothing.
    async fn close(&self) -> AdapterResult<()>;
}

/// A boxed adapter trait object.
pub type BoxedAdapter = Arc<dyn Adapter>;

/// What the runtime provides while an adapter is being constructed.
#[derive(Clone)]
pub struct BuildContext {
    transport: TransportContext,
    funnel_capacity: usize,
}

impl BuildContext {
    /// Creates a build context.
    pub fn new(transport: TransportContext) -> Self {
        Self {
            transport,
            funnel_capacity: DEFAULT_FUNNEL_CAPACITY,
        }
    }

    /// Overrides the funnel capacity.
    pub fn with_funnel_capacity(mut self, capacity: usize) -> Self {
        self.funnel_capacity = capacity;
        self
    }

    /// Available transport capabilities.
    pub fn transport(&self) -> &TransportContext {
        &self.transport
    }

    /// Capacity of the funnel the adapter should create.
    pub fn funnel_capacity(&self) -> usize {
        self.funnel_capacity
    }
}

/// Trait for adapters that can be created from configuration.
///
/// Construction may talk to the platform (for example to authenticate), so
/// it is async and receives the transport capabilities.
#[async_trait]
pub trait ConfigurableAdapter: Adapter {
    /// The configuration type for this adapter.
    type Config: serde::de::DeserializeOwned + Default + Send + 'static;

    /// Creates an adapter from its configuration.
    async fn from_config(config: Self::Config, ctx: &BuildContext) -> AdapterResult<Arc<Self>>
    where
        Self: Sized;
}
