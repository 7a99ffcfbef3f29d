//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, RuntimeSettings, TetherConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &TetherConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_runtime_settings(&config.runtime)?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Log filter module name cannot be empty: {module:?}"
        )));
    }

    Ok(())
}

/// Validates runtime settings.
fn validate_runtime_settings(runtime: &RuntimeSettings) -> ConfigResult<()> {
    if runtime.funnel_capacity == 0 {
        return Err(ConfigError::validation(
            "Funnel capacity must be greater than 0",
        ));
    }
    Ok(())
}
