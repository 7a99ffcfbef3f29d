//! Configuration module for the Tether runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for logging, runtime settings and per-adapter sections.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use schema::{
    LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, RuntimeSettings, SpanEventConfig,
    TetherConfig,
};
pub use validation::validate_config;
