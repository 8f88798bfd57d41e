//! Entity shapes and identities.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::extras::Extras;

/// The command family a command belongs to.
///
/// Each family is its own namespace: a prefix command and a slash command may
/// share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Text command invoked with a prefix.
    Prefix,
    /// Slash (application) command.
    Slash,
    /// User context-menu command.
    User,
    /// Message context-menu command.
    Message,
}

impl CommandKind {
    /// Returns the kind as a lowercase string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Slash => "slash",
            Self::User => "user",
            Self::Message => "message",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible identity of a command: its kind plus its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId {
    kind: CommandKind,
    name: Cow<'static, str>,
}

impl CommandId {
    /// Creates a command identity.
    pub fn new(kind: CommandKind, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Shorthand for a [`CommandKind::Prefix`] identity.
    pub fn prefix(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(CommandKind::Prefix, name)
    }

    /// Shorthand for a [`CommandKind::Slash`] identity.
    pub fn slash(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(CommandKind::Slash, name)
    }

    /// Shorthand for a [`CommandKind::User`] identity.
    pub fn user(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(CommandKind::User, name)
    }

    /// Shorthand for a [`CommandKind::Message`] identity.
    pub fn message(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(CommandKind::Message, name)
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} command '{}'", self.kind, self.name)
    }
}

/// A command object the plugin stores and hands to the host.
///
/// The command's behaviour (argument parsing, invocation) belongs to the host;
/// the core only needs its identity. Plugin-wide defaults and checks reach the
/// command through [`apply_defaults`](Command::apply_defaults) and
/// [`prepend_checks`](Command::prepend_checks), both called on the copy handed
/// to the host at bind time.
pub trait Command: Clone + Send + Sync + 'static {
    /// Predicate type the host evaluates before invoking the command.
    type Check: Clone + Send + Sync + 'static;

    /// Returns the command's identity.
    fn id(&self) -> CommandId;

    /// Fills attributes the command left unset from plugin-wide defaults.
    /// Values the command sets itself win.
    fn apply_defaults(&mut self, _defaults: &CommandAttrs) {}

    /// Puts plugin-wide checks ahead of the command's own checks.
    fn prepend_checks(&mut self, _checks: &[Self::Check]) {}
}

/// Attribute defaults for one command kind, e.g. `{"guild_ids": [123]}`.
pub type CommandAttrs = Extras;

/// One value per [`CommandKind`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindMap<T> {
    #[serde(default)]
    pub prefix: T,
    #[serde(default)]
    pub slash: T,
    #[serde(default)]
    pub user: T,
    #[serde(default)]
    pub message: T,
}

impl<T> KindMap<T> {
    pub fn get(&self, kind: CommandKind) -> &T {
        match kind {
            CommandKind::Prefix => &self.prefix,
            CommandKind::Slash => &self.slash,
            CommandKind::User => &self.user,
            CommandKind::Message => &self.message,
        }
    }

    pub fn get_mut(&mut self, kind: CommandKind) -> &mut T {
        match kind {
            CommandKind::Prefix => &mut self.prefix,
            CommandKind::Slash => &mut self.slash,
            CommandKind::User => &mut self.user,
            CommandKind::Message => &mut self.message,
        }
    }
}

impl<T: Clone> KindMap<Vec<T>> {
    /// Appends `other`'s entries after this map's own, kind by kind.
    pub fn extend_from(&mut self, other: &Self) {
        self.prefix.extend(other.prefix.iter().cloned());
        self.slash.extend(other.slash.iter().cloned());
        self.user.extend(other.user.iter().cloned());
        self.message.extend(other.message.iter().cloned());
    }
}

/// A listener callable the plugin stores and hands to the host.
///
/// Several listeners may share an event name, so identity is decided by
/// [`same_callback`](Listener::same_callback) together with the event name.
pub trait Listener: Clone + Send + Sync + 'static {
    /// Returns `true` if `self` and `other` are the same callable.
    fn same_callback(&self, other: &Self) -> bool;
}

/// Shared callables compare by allocation.
impl<T: ?Sized + Send + Sync + 'static> Listener for Arc<T> {
    fn same_callback(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

/// The entity kinds the binder attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Command,
    Listener,
    Loop,
}

impl EntityKind {
    /// Attach order. Detach walks it backwards.
    ///
    /// Commands come first: a listener may react to command registration.
    /// Loops start last, once everything they might touch is attached.
    pub const BIND_ORDER: [EntityKind; 3] =
        [EntityKind::Command, EntityKind::Listener, EntityKind::Loop];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => f.write_str("command"),
            Self::Listener => f.write_str("listener"),
            Self::Loop => f.write_str("loop"),
        }
    }
}

/// Diagnostic reference to a single entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Command(CommandId),
    Listener { event: String },
    Loop { name: String },
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Command(_) => EntityKind::Command,
            Self::Listener { .. } => EntityKind::Listener,
            Self::Loop { .. } => EntityKind::Loop,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(id) => id.fmt(f),
            Self::Listener { event } => write!(f, "listener for '{event}'"),
            Self::Loop { name } => write!(f, "loop '{name}'"),
        }
    }
}
