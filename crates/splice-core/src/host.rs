//! The host application handle.
//!
//! A [`Host`] is the running bot instance that owns the connection and
//! dispatches commands and events. The core never drives the host on its own;
//! it only calls the add/remove primitives below while binding or unbinding a
//! [`Plugin`](crate::Plugin).

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::entity::{Command, CommandId, Listener};

/// Boxed error type used for host and hook failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Primitives a host application exposes to the binder.
///
/// Removal must tolerate absent entities: report them as `Ok(None)` /
/// `Ok(false)` rather than as an error. The binder treats a removal error as
/// a best-effort failure anyway, logs it, and moves on to the next entity.
///
/// # Example
///
/// ```rust,ignore
/// impl Host for MyBot {
///     type Command = MyCommand;
///     type Listener = Arc<dyn Fn(&Event) + Send + Sync>;
///
///     fn add_command(&self, command: MyCommand) -> Result<(), BoxError> {
///         self.tree.write().insert(command)
///     }
///     // ...
/// }
/// ```
pub trait Host: Send + Sync + 'static {
    /// Command object understood by this host.
    type Command: Command;

    /// Listener callable understood by this host.
    type Listener: Listener;

    /// Attaches a command.
    fn add_command(&self, command: Self::Command) -> Result<(), BoxError>;

    /// Detaches the command with the given identity.
    ///
    /// Returns `Ok(None)` when no such command is attached.
    fn remove_command(&self, id: &CommandId) -> Result<Option<Self::Command>, BoxError>;

    /// Attaches a listener for `event`.
    fn add_listener(&self, event: &str, listener: Self::Listener) -> Result<(), BoxError>;

    /// Detaches a listener previously attached for `event`.
    ///
    /// Returns `Ok(false)` when the listener was not attached.
    fn remove_listener(&self, event: &str, listener: &Self::Listener) -> Result<bool, BoxError>;

    /// Called once after every successful bind and every unbind so the host
    /// can push its command tree to the remote service.
    fn schedule_command_sync(&self) {}

    /// Resolves once the host has connected and its caches are filled.
    ///
    /// Task loops created with `wait_until_ready` await this before their
    /// first tick. The default resolves immediately.
    fn wait_until_ready(self: Arc<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}
