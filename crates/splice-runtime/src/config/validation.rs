//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, SpliceConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &SpliceConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;

    let mut seen = HashSet::new();
    for ext in &config.extensions {
        if ext.name.trim().is_empty() {
            return Err(ConfigError::validation("Extension name cannot be empty"));
        }
        if !seen.insert(ext.name.as_str()) {
            return Err(ConfigError::DuplicateExtension(ext.name.clone()));
        }
    }

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }
    Ok(())
}
