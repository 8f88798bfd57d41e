//! # Splice Core
//!
//! Registration and lifecycle machinery for bot extensions.
//!
//! Commands, listeners, and load/unload hooks are declared on a free-standing
//! [`Plugin`] container instead of on methods of an inheriting class. This
//! crate provides:
//!
//! - Ordered entity registries keyed by stable identity
//! - The [`Plugin`] registration surface, including [`Plugin::extend`] for
//!   merging independently defined plugins
//! - A lifecycle hook chain accepting sync or async callables, with or
//!   without the host argument, run in pre/post load and unload stages
//! - [`TaskLoop`]s that run while their plugin is bound
//! - Plugin-wide command checks and per-kind command defaults
//!   ([`PluginMetadata`])
//! - The [`binder`]: the load/unload protocol that attaches a plugin to a
//!   live [`Host`] and detaches it again
//! - [`create_extension_handlers`], producing the `setup` / `teardown` pair an
//!   extension loader invokes
//!
//! The host application itself (network, event dispatch, command parsing) is
//! abstracted behind the [`Host`] trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use splice_core::{Plugin, create_extension_handlers};
//!
//! let plugin = Plugin::<MyBot>::new("greetings");
//! plugin.command(MyCommand::slash("hello"))?;
//! plugin.listener("on_message", Arc::new(on_message));
//! plugin.load_hook(|bot: Arc<MyBot>| async move { bot.warm_cache().await });
//!
//! let handlers = create_extension_handlers(Arc::new(plugin));
//! handlers.setup(bot.clone()).await?;
//! ```

pub mod binder;
pub mod entity;
pub mod entrypoint;
pub mod error;
pub mod extras;
pub mod hook;
pub mod host;
pub mod metadata;
pub mod plugin;
pub mod registry;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use binder::{bind, bind_with_cancellation, unbind};
pub use entity::{
    Command, CommandAttrs, CommandId, CommandKind, EntityKind, EntityRef, KindMap, Listener,
};
pub use entrypoint::{ExtensionHandlers, SetupFn, TeardownFn, create_extension_handlers};
pub use error::{HookError, HookFailure, PluginError, PluginResult};
pub use extras::{Extras, ExtrasKey};
pub use hook::{Hook, HookChain, HookId, HookStage, IntoHook, IntoHookResult};
pub use host::{BoxError, Host};
pub use metadata::{CATEGORY, PluginMetadata};
pub use plugin::{CheckOf, Plugin, PluginBuilder};
pub use registry::{DuplicateIdentity, EntityRegistry};
pub use task::TaskLoop;

pub use tokio_util::sync::CancellationToken;
