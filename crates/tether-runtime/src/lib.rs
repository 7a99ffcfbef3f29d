//! Tether Runtime - Orchestration layer for the Tether chat bridge.
//!
//! This crate provides:
//! - Runtime orchestration (`TetherRuntime`)
//! - Layered configuration loading (`ConfigLoader`)
//! - Automatic transport capability initialization
//! - Logging configuration
//!
//! # Automatic Transport Initialization
//!
//! The runtime automatically initializes all available transport capabilities
//! based on enabled cargo features:
//!
//! - `ws-client`: WebSocket client capability
//! - `http-client`: HTTP client capability
//! - `http-server`: HTTP server capability
//! - `tls`: HTTPS for the HTTP server
//!
//! ```ignore
//! use tether_runtime::TetherRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = TetherRuntime::new();
//!
//!     // Adapters are built from their `[adapters.<name>]` section
//!     let slack = runtime.register_adapter::<SlackAdapter>().await?;
//!     let events = runtime.take_event_receiver().await;
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Manual Transport Configuration
//!
//! ```ignore
//! use tether_core::TransportContext;
//! use tether_transport::HttpClientCapabilityImpl;
//!
//! let ctx = TransportContext::new()
//!     .with_http_client(Arc::new(HttpClientCapabilityImpl::new()?));
//! let runtime = TetherRuntime::with_transport_context(&config, ctx);
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, TetherConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::{RuntimeBuilder, TetherRuntime};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
