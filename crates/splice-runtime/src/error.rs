//! Runtime error types.

use splice_core::PluginError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the [`ExtensionManager`](crate::ExtensionManager).
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("extension '{0}' is not registered")]
    ExtensionNotFound(String),

    #[error("extension '{0}' is already registered")]
    ExtensionExists(String),

    #[error("extension '{0}' is already loaded")]
    AlreadyLoaded(String),

    #[error("extension '{0}' is not loaded")]
    NotLoaded(String),

    /// Building, binding, or unbinding the extension's plugin failed.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
