//! Error types for plugin registration and lifecycle.

use std::any::Any;
use std::fmt;

use thiserror::Error;

use crate::entity::{CommandId, EntityRef};
use crate::hook::HookId;
use crate::host::BoxError;

/// Why a single hook failed.
#[derive(Debug, Error)]
pub enum HookError {
    /// The hook returned an error.
    #[error(transparent)]
    Failed(BoxError),

    /// The hook was still pending when the bind was cancelled.
    #[error("hook was cancelled")]
    Cancelled,

    /// The hook panicked. The panic was caught so the rest of the chain runs.
    #[error("hook panicked: {0}")]
    Panicked(String),
}

impl HookError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        Self::Panicked(message)
    }
}

/// One failed unload hook.
#[derive(Debug)]
pub struct HookFailure {
    pub hook: HookId,
    pub error: HookError,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.hook, self.error)
    }
}

/// Errors raised by [`Plugin`](crate::Plugin) registration and by the binder.
///
/// Registration errors ([`DuplicateIdentity`](Self::DuplicateIdentity)) are
/// programming mistakes and surface at the registration call. Bind and unbind
/// errors are raised only after rollback or cleanup has run.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A command with the same kind and name is already registered.
    #[error("plugin '{plugin}' already has a {id}")]
    DuplicateIdentity { plugin: String, id: CommandId },

    /// The plugin is already bound (or binding) to a host.
    #[error("plugin '{plugin}' is already bound to a host")]
    AlreadyBound { plugin: String },

    /// A host attach call failed. Everything attached before it was detached.
    #[error("plugin '{plugin}' failed to attach {entity}: {source}")]
    BindFailed {
        plugin: String,
        entity: EntityRef,
        #[source]
        source: BoxError,
    },

    /// A load hook failed or was cancelled. All attached entities were detached.
    #[error("{hook} of plugin '{plugin}' failed: {source}")]
    LoadHookFailed {
        plugin: String,
        hook: HookId,
        #[source]
        source: HookError,
    },

    /// One or more unload hooks failed. Every hook still ran and every entity
    /// was still detached.
    #[error(
        "{} unload hook(s) of plugin '{plugin}' failed: {}",
        failures.len(),
        failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    UnloadHooksFailed {
        plugin: String,
        failures: Vec<HookFailure>,
    },

    /// The plugin is not bound to any host.
    #[error("plugin '{plugin}' is not bound to a host")]
    NotBound { plugin: String },
}

impl PluginError {
    /// Name of the plugin the error originated from.
    pub fn plugin(&self) -> &str {
        match self {
            Self::DuplicateIdentity { plugin, .. }
            | Self::AlreadyBound { plugin }
            | Self::BindFailed { plugin, .. }
            | Self::LoadHookFailed { plugin, .. }
            | Self::UnloadHooksFailed { plugin, .. }
            | Self::NotBound { plugin } => plugin,
        }
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;
