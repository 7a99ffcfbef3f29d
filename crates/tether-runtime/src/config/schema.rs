//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use figment::value::Value;
use serde::{Deserialize, Serialize};
use tether_core::DEFAULT_FUNNEL_CAPACITY;

/// Root configuration structure.
///
/// ```toml
/// [logging]
/// level = "info"
/// format = "compact"
///
/// [runtime]
/// funnel_capacity = 1024
///
/// [adapters.slack]
/// token = "xoxb-..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TetherConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Runtime settings shared by every adapter.
    #[serde(default)]
    pub runtime: RuntimeSettings,

    /// Raw adapter sections, keyed by adapter name.
    ///
    /// Each adapter deserializes its own section into its `Config` type.
    #[serde(default)]
    pub adapters: HashMap<String, Value>,
}

// =============================================================================
// Runtime
// =============================================================================

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Events buffered in each adapter's funnel before producers wait.
    #[serde(default = "default_funnel_capacity")]
    pub funnel_capacity: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            funnel_capacity: default_funnel_capacity(),
        }
    }
}

fn default_funnel_capacity() -> usize {
    DEFAULT_FUNNEL_CAPACITY
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global level. `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,

    /// Destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// How often the log file rolls over.
    #[serde(default)]
    pub rotation: LogRotation,

    /// Include thread IDs.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    /// Span lifecycle events to log.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-module levels, e.g. `tether_adapter_slack = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            rotation: LogRotation::default(),
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            filters: HashMap::new(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lower-case name, as used in filter directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to the `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to compact otherwise.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Log file rotation period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TetherConfig::default();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.runtime.funnel_capacity, 1024);
        assert!(config.adapters.is_empty());
    }

    #[test]
    fn test_yaml_round_trip_of_partial_config() {
        let yaml = r#"
logging:
  level: debug
  output: file
  file_path: /var/log/tether.log
  rotation: daily
  filters:
    tether_adapter_slack: trace
runtime:
  funnel_capacity: 16
adapters:
  slack:
    token: xoxb-1
"#;
        let config: TetherConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.output, LogOutput::File);
        assert_eq!(config.logging.rotation, LogRotation::Daily);
        assert_eq!(
            config.logging.filters.get("tether_adapter_slack"),
            Some(&LogLevel::Trace)
        );
        assert_eq!(config.runtime.funnel_capacity, 16);
        assert!(config.adapters.contains_key("slack"));
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        let result = serde_yaml::from_str::<LoggingConfig>("level: verbose");
        assert!(result.is_err());
    }

    #[test]
    fn test_level_conversion() {
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }
}
