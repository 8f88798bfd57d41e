//! Configuration module for the splice runtime.
//!
//! Configuration is layered with figment (defaults, files, `SPLICE_*`
//! environment variables) and validated before use.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{ExtensionConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpliceConfig};
pub use validation::validate_config;
