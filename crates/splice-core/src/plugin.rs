//! The [`Plugin`] container.
//!
//! A plugin is the per-module registration surface. Commands, listeners, and
//! hooks are registered on it eagerly, plugins can be merged with
//! [`Plugin::extend`], and the binder attaches the result to a host.
//!
//! # Example
//!
//! ```rust,ignore
//! let plugin = Plugin::<MyBot>::builder("moderation")
//!     .extra("category", "admin")
//!     .build();
//!
//! let ban = plugin.command(MyCommand::slash("ban", ban_handler))?;
//! plugin.listener("on_member_join", Arc::new(greet));
//! plugin.unload_hook(flush_audit_log);
//! plugin.slash_command_check(require_guild);
//! plugin.register_loop(TaskLoop::every(Duration::from_secs(300), prune_cases));
//!
//! // Sub-modules define their own plugins and get merged in:
//! plugin.extend(&crate::moderation::warnings::plugin())?;
//!
//! let (setup, teardown) = plugin_arc.create_extension_handlers().into_parts();
//! ```
//!
//! # Registration after binding
//!
//! Registering on a bound plugin is allowed but does not reach the live host:
//! the binder records exactly what it attached, and only the next bind cycle
//! picks up the new entries. The same holds for checks, command defaults, and
//! loops.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::binder;
use crate::entity::{Command, CommandAttrs, CommandId, CommandKind, KindMap};
use crate::entrypoint::{ExtensionHandlers, create_extension_handlers};
use crate::error::{PluginError, PluginResult};
use crate::extras::{Extras, ExtrasKey};
use crate::hook::{HookChain, HookStage, IntoHook};
use crate::host::Host;
use crate::metadata::{CATEGORY, PluginMetadata};
use crate::registry::{DuplicateIdentity, EntityRegistry};
use crate::task::{RunningLoop, TaskLoop};

pub(crate) type Registry<H> = EntityRegistry<<H as Host>::Command, <H as Host>::Listener>;

/// The check type of a host's commands.
pub type CheckOf<H> = <<H as Host>::Command as Command>::Check;

/// Everything a bind needs, copied out of the plugin's locks.
pub(crate) struct Snapshot<H: Host> {
    pub(crate) registry: Registry<H>,
    pub(crate) hooks: HookChain<H>,
    pub(crate) loops: Vec<TaskLoop<H>>,
    checks: KindMap<Vec<CheckOf<H>>>,
    defaults: KindMap<CommandAttrs>,
}

impl<H: Host> Snapshot<H> {
    /// The copy of `command` handed to the host: plugin defaults filled in,
    /// plugin-wide checks ahead of the command's own.
    pub(crate) fn prepare(&self, command: &H::Command) -> H::Command {
        let mut command = command.clone();
        let kind = command.id().kind();
        let defaults = self.defaults.get(kind);
        if !defaults.is_empty() {
            command.apply_defaults(defaults);
        }
        let checks = self.checks.get(kind);
        if !checks.is_empty() {
            command.prepend_checks(checks);
        }
        command
    }
}

// ─── Bind state ──────────────────────────────────────────────────────────────

/// Entities the binder handed to a host during one bind, plus the hook chain
/// that bind ran.
pub(crate) struct Attached<H: Host> {
    pub(crate) commands: Vec<H::Command>,
    pub(crate) listeners: Vec<(String, H::Listener)>,
    pub(crate) loops: Vec<RunningLoop>,
    pub(crate) hooks: HookChain<H>,
}

impl<H: Host> Default for Attached<H> {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            listeners: Vec::new(),
            loops: Vec::new(),
            hooks: HookChain::default(),
        }
    }
}

impl<H: Host> Attached<H> {
    pub(crate) fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.listeners.is_empty() && self.loops.is_empty()
    }
}

/// The bound-reference of a plugin.
///
/// ```text
/// Unbound ──bind──► Binding ──ok──► Bound ──unbind──► Unbinding ──► Unbound
///                      └──err / cancel──► Unbound
/// ```
pub(crate) enum BindState<H: Host> {
    Unbound,
    Binding(Arc<H>),
    Bound { host: Arc<H>, attached: Attached<H> },
    Unbinding(Arc<H>),
}

impl<H: Host> BindState<H> {
    fn host(&self) -> Option<&Arc<H>> {
        match self {
            Self::Unbound => None,
            Self::Binding(host) | Self::Unbinding(host) | Self::Bound { host, .. } => Some(host),
        }
    }
}

// ─── Plugin ──────────────────────────────────────────────────────────────────

/// A container of commands, listeners, lifecycle hooks, task loops, and
/// plugin-wide command checks.
///
/// All registration methods take `&self`, so a plugin can be shared behind an
/// `Arc` while it is still being filled. A plugin is bound to at most one host
/// at a time.
pub struct Plugin<H: Host> {
    name: Cow<'static, str>,
    extras: RwLock<Extras>,
    command_attrs: RwLock<KindMap<CommandAttrs>>,
    registry: RwLock<Registry<H>>,
    hooks: RwLock<HookChain<H>>,
    loops: RwLock<Vec<TaskLoop<H>>>,
    checks: RwLock<KindMap<Vec<CheckOf<H>>>>,
    state: Mutex<BindState<H>>,
}

impl<H: Host> Plugin<H> {
    /// Creates an empty plugin.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self::builder(name).build()
    }

    /// Starts building a plugin with extras.
    pub fn builder(name: impl Into<Cow<'static, str>>) -> PluginBuilder<H> {
        PluginBuilder {
            name: name.into(),
            extras: Extras::new(),
            command_attrs: KindMap::default(),
            _host: std::marker::PhantomData,
        }
    }

    /// Creates an empty plugin described by `metadata`.
    pub fn with_metadata(metadata: PluginMetadata) -> Self {
        PluginBuilder {
            name: metadata.name.into(),
            extras: metadata.extras,
            command_attrs: metadata.command_attrs,
            _host: std::marker::PhantomData,
        }
        .build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ─── Registration ────────────────────────────────────────────────────────

    /// Registers a command and hands it back unchanged.
    ///
    /// Fails immediately with [`PluginError::DuplicateIdentity`] if a command
    /// of the same kind and name is already registered.
    pub fn command(&self, command: H::Command) -> PluginResult<H::Command> {
        self.registry
            .write()
            .register_command(command.clone())
            .map_err(|e| self.duplicate(e))?;
        debug!(plugin = %self.name, command = %command.id(), "Command registered");
        Ok(command)
    }

    /// Registers a listener for `event` and hands it back unchanged.
    pub fn listener(&self, event: impl Into<String>, listener: H::Listener) -> H::Listener {
        let event = event.into();
        debug!(plugin = %self.name, event = %event, "Listener registered");
        self.registry
            .write()
            .register_listener(event, listener.clone());
        listener
    }

    /// Registers several listeners for the same event, in order.
    pub fn add_listeners(&self, event: &str, listeners: impl IntoIterator<Item = H::Listener>) {
        let mut registry = self.registry.write();
        for listener in listeners {
            registry.register_listener(event, listener);
        }
    }

    /// Registers a hook for `stage` and hands it back unchanged.
    ///
    /// Load-stage hooks run in registration order, unload-stage hooks in
    /// reverse registration order.
    pub fn hook<M, F: IntoHook<H, M>>(&self, stage: HookStage, hook: F) -> F {
        self.hooks.write().push(stage, hook.clone().into_hook());
        hook
    }

    /// Registers a load hook, run after every entity is attached.
    pub fn load_hook<M, F: IntoHook<H, M>>(&self, hook: F) -> F {
        self.hook(HookStage::PostLoad, hook)
    }

    /// Registers a hook run before anything is attached.
    pub fn pre_load_hook<M, F: IntoHook<H, M>>(&self, hook: F) -> F {
        self.hook(HookStage::PreLoad, hook)
    }

    /// Registers an unload hook, run before entities are detached.
    pub fn unload_hook<M, F: IntoHook<H, M>>(&self, hook: F) -> F {
        self.hook(HookStage::PreUnload, hook)
    }

    /// Registers a hook run after every entity is detached.
    pub fn post_unload_hook<M, F: IntoHook<H, M>>(&self, hook: F) -> F {
        self.hook(HookStage::PostUnload, hook)
    }

    /// Registers a task loop and hands it back unchanged.
    ///
    /// The loop starts when the plugin is bound and is cancelled when it is
    /// unbound.
    pub fn register_loop(&self, task: TaskLoop<H>) -> TaskLoop<H> {
        debug!(plugin = %self.name, task = %task.name(), "Loop registered");
        self.loops.write().push(task.clone());
        task
    }

    /// Registers a check prepended to every command of `kind` when it is
    /// attached, and hands it back unchanged.
    pub fn check(&self, kind: CommandKind, check: CheckOf<H>) -> CheckOf<H> {
        self.checks.write().get_mut(kind).push(check.clone());
        check
    }

    /// Plugin-wide check for prefix commands.
    pub fn command_check(&self, check: CheckOf<H>) -> CheckOf<H> {
        self.check(CommandKind::Prefix, check)
    }

    pub fn slash_command_check(&self, check: CheckOf<H>) -> CheckOf<H> {
        self.check(CommandKind::Slash, check)
    }

    pub fn user_command_check(&self, check: CheckOf<H>) -> CheckOf<H> {
        self.check(CommandKind::User, check)
    }

    pub fn message_command_check(&self, check: CheckOf<H>) -> CheckOf<H> {
        self.check(CommandKind::Message, check)
    }

    /// Copies every entity, hook, loop, and check of `other` into this
    /// plugin, after this plugin's own.
    ///
    /// Fails with [`PluginError::DuplicateIdentity`] under the same rule as
    /// [`command`](Self::command); on failure nothing is copied. `other` is
    /// left untouched and stays usable on its own. Extras and command
    /// defaults are not merged.
    pub fn extend(&self, other: &Plugin<H>) -> PluginResult<()> {
        let other_registry = other.registry.read().clone();
        let other_hooks = other.hooks.read().clone();
        let other_loops = other.loops.read().clone();
        let other_checks = other.checks.read().clone();

        self.registry
            .write()
            .merge(&other_registry)
            .map_err(|e| self.duplicate(e))?;
        self.hooks.write().extend_from(&other_hooks);
        self.loops.write().extend(other_loops);
        self.checks.write().extend_from(&other_checks);
        debug!(plugin = %self.name, from = %other.name, "Plugin extended");
        Ok(())
    }

    fn duplicate(&self, DuplicateIdentity(id): DuplicateIdentity) -> PluginError {
        PluginError::DuplicateIdentity {
            plugin: self.name.to_string(),
            id,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    /// Registered commands, in registration order.
    pub fn commands(&self) -> Vec<H::Command> {
        self.registry.read().commands().cloned().collect()
    }

    /// Registered listeners with their event names, in registration order.
    pub fn listeners(&self) -> Vec<(String, H::Listener)> {
        self.registry
            .read()
            .listeners()
            .map(|(e, l)| (e.to_owned(), l.clone()))
            .collect()
    }

    /// Looks up a registered command.
    pub fn get_command(&self, kind: CommandKind, name: &str) -> Option<H::Command> {
        self.registry
            .read()
            .command(&CommandId::new(kind, name.to_owned()))
            .cloned()
    }

    pub fn hook_count(&self, stage: HookStage) -> usize {
        self.hooks.read().hooks(stage).len()
    }

    /// Number of pre- and post-load hooks.
    pub fn load_hook_count(&self) -> usize {
        self.hook_count(HookStage::PreLoad) + self.hook_count(HookStage::PostLoad)
    }

    /// Number of pre- and post-unload hooks.
    pub fn unload_hook_count(&self) -> usize {
        self.hook_count(HookStage::PreUnload) + self.hook_count(HookStage::PostUnload)
    }

    /// Registered task loops, in registration order.
    pub fn loops(&self) -> Vec<TaskLoop<H>> {
        self.loops.read().clone()
    }

    /// Plugin-wide checks for commands of `kind`.
    pub fn checks(&self, kind: CommandKind) -> Vec<CheckOf<H>> {
        self.checks.read().get(kind).clone()
    }

    /// Default attributes for commands of `kind`.
    pub fn command_attrs(&self, kind: CommandKind) -> CommandAttrs {
        self.command_attrs.read().get(kind).clone()
    }

    pub fn set_command_attrs(&self, kind: CommandKind, attrs: CommandAttrs) {
        *self.command_attrs.write().get_mut(kind) = attrs;
    }

    /// The `category` extra, if set.
    pub fn category(&self) -> Option<String> {
        self.get(&CATEGORY)
    }

    /// A copy of the plugin's name, extras, and command defaults.
    pub fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: self.name.to_string(),
            extras: self.extras(),
            command_attrs: self.command_attrs.read().clone(),
        }
    }

    /// A copy of the extras map.
    pub fn extras(&self) -> Extras {
        self.extras.read().clone()
    }

    pub fn set_extras(&self, extras: Extras) {
        *self.extras.write() = extras;
    }

    /// Merges `extras` into the current map, overwriting existing keys.
    pub fn merge_extras(&self, extras: Extras) {
        self.extras.write().extend(extras);
    }

    pub fn get<T: DeserializeOwned>(&self, key: &ExtrasKey<T>) -> Option<T> {
        key.get(&self.extras.read())
    }

    pub fn insert<T: Serialize>(&self, key: &ExtrasKey<T>, value: T) -> Option<Value> {
        key.insert(&mut self.extras.write(), value)
    }

    pub fn remove<T>(&self, key: &ExtrasKey<T>) -> Option<Value> {
        key.remove(&mut self.extras.write())
    }

    /// Whether the plugin is bound (or being bound) to a host.
    pub fn is_bound(&self) -> bool {
        self.state.lock().host().is_some()
    }

    /// The host this plugin is bound to.
    ///
    /// Available from the start of a bind (so load hooks can use it) until
    /// the end of an unbind.
    pub fn host(&self) -> PluginResult<Arc<H>> {
        self.state
            .lock()
            .host()
            .cloned()
            .ok_or_else(|| PluginError::NotBound {
                plugin: self.name.to_string(),
            })
    }

    // ─── Lifecycle shortcuts ─────────────────────────────────────────────────

    /// Binds this plugin to `host`. See [`binder::bind`].
    pub async fn load(&self, host: Arc<H>) -> PluginResult<()> {
        binder::bind(self, host).await
    }

    /// Unbinds this plugin. See [`binder::unbind`].
    pub async fn unload(&self) -> PluginResult<()> {
        binder::unbind(self).await
    }

    /// Creates the `setup` / `teardown` pair for an extension loader.
    pub fn create_extension_handlers(self: &Arc<Self>) -> ExtensionHandlers<H> {
        create_extension_handlers(Arc::clone(self))
    }

    // ─── Binder internals ────────────────────────────────────────────────────

    /// Copies of everything a bind attaches, taken without holding any lock
    /// afterwards.
    pub(crate) fn snapshot(&self) -> Snapshot<H> {
        Snapshot {
            registry: self.registry.read().clone(),
            hooks: self.hooks.read().clone(),
            loops: self.loops.read().clone(),
            checks: self.checks.read().clone(),
            defaults: self.command_attrs.read().clone(),
        }
    }

    /// `Unbound` → `Binding`, or `AlreadyBound`.
    pub(crate) fn begin_bind(&self, host: &Arc<H>) -> PluginResult<()> {
        let mut state = self.state.lock();
        match *state {
            BindState::Unbound => {
                *state = BindState::Binding(Arc::clone(host));
                Ok(())
            }
            _ => Err(PluginError::AlreadyBound {
                plugin: self.name.to_string(),
            }),
        }
    }

    pub(crate) fn finish_bind(&self, host: Arc<H>, attached: Attached<H>) {
        *self.state.lock() = BindState::Bound { host, attached };
    }

    /// `Bound` → `Unbinding`, yielding what the bind attached.
    pub(crate) fn begin_unbind(&self) -> Option<(Arc<H>, Attached<H>)> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, BindState::Unbound) {
            BindState::Bound { host, attached } => {
                *state = BindState::Unbinding(Arc::clone(&host));
                Some((host, attached))
            }
            other => {
                *state = other;
                None
            }
        }
    }

    pub(crate) fn reset(&self) {
        *self.state.lock() = BindState::Unbound;
    }
}

impl<H: Host> fmt::Debug for Plugin<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("commands", &registry.command_count())
            .field("listeners", &registry.listener_count())
            .field("load_hooks", &self.load_hook_count())
            .field("unload_hooks", &self.unload_hook_count())
            .field("loops", &self.loops.read().len())
            .field("bound", &self.is_bound())
            .finish()
    }
}

// ─── PluginBuilder ───────────────────────────────────────────────────────────

/// Builder for a [`Plugin`] with initial extras and command defaults.
pub struct PluginBuilder<H> {
    name: Cow<'static, str>,
    extras: Extras,
    command_attrs: KindMap<CommandAttrs>,
    _host: std::marker::PhantomData<fn() -> H>,
}

impl<H: Host> PluginBuilder<H> {
    /// Adds one raw extra.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Replaces all extras.
    pub fn extras(mut self, extras: Extras) -> Self {
        self.extras = extras;
        self
    }

    /// Sets the `category` extra.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        CATEGORY.insert(&mut self.extras, category.into());
        self
    }

    /// Default attributes for every command of `kind`.
    pub fn command_attrs(mut self, kind: CommandKind, attrs: CommandAttrs) -> Self {
        *self.command_attrs.get_mut(kind) = attrs;
        self
    }

    pub fn build(self) -> Plugin<H> {
        Plugin {
            name: self.name,
            extras: RwLock::new(self.extras),
            command_attrs: RwLock::new(self.command_attrs),
            registry: RwLock::new(EntityRegistry::default()),
            hooks: RwLock::new(HookChain::default()),
            loops: RwLock::new(Vec::new()),
            checks: RwLock::new(KindMap::default()),
            state: Mutex::new(BindState::Unbound),
        }
    }
}
