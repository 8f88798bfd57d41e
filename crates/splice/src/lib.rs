//! # Splice
//!
//! Free-standing registration containers for bot extensions.
//!
//! ## Overview
//!
//! A [`Plugin`](core::Plugin) collects commands, event listeners, task
//! loops, and load/unload hooks without subclassing anything. Plugins defined in
//! separate modules can be merged with `extend`, and a single plugin is
//! turned into the `setup` / `teardown` entry points an extension loader
//! calls.
//!
//! ```text
//! ┌──────────────┐ extend ┌──────────────┐  setup(host)   ┌──────────┐
//! │ Plugin "mod" │───────▶│ Plugin "ext" │───────────────▶│   Host   │
//! └──────────────┘        └──────────────┘◀───────────────└──────────┘
//!                                           teardown(host)
//! ```
//!
//! Binding is all or nothing: if an attach call or a load hook fails, every
//! entity attached so far is detached again before the error is returned.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use splice::prelude::*;
//!
//! pub fn plugin() -> PluginResult<Arc<Plugin<MyBot>>> {
//!     let plugin = Plugin::new("greetings");
//!     plugin.command(MyCommand::slash("hello"))?;
//!     plugin.load_hook(|| info!("greetings ready"));
//!     plugin.extend(&moderation::plugin()?)?;
//!     Ok(Arc::new(plugin))
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use splice_core as core;
pub use splice_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use splice::prelude::*;
/// ```
pub mod prelude {
    // Registration
    pub use splice_core::{
        Command, CommandAttrs, CommandId, CommandKind, ExtrasKey, Listener, Plugin, PluginError,
        PluginMetadata, PluginResult, TaskLoop,
    };

    // Lifecycle
    pub use splice_core::{
        BoxError, CancellationToken, ExtensionHandlers, HookStage, Host,
        create_extension_handlers,
    };

    // Runtime
    pub use splice_runtime::{ConfigLoader, ExtensionManager, LoggingBuilder, SpliceConfig};

    pub use std::sync::Arc;
    pub use tracing::{debug, error, info, trace, warn};
}
