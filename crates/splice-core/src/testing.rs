//! Test doubles shared by the unit tests.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use crate::entity::{Command, CommandAttrs, CommandId};
use crate::host::{BoxError, Host};

/// A command whose checks are plain labels.
#[derive(Debug, Clone)]
pub struct TestCommand {
    id: CommandId,
    checks: Vec<&'static str>,
    attrs: CommandAttrs,
}

impl TestCommand {
    fn new(id: CommandId) -> Self {
        Self {
            id,
            checks: Vec::new(),
            attrs: CommandAttrs::new(),
        }
    }

    pub fn slash(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(CommandId::slash(name))
    }

    pub fn prefix(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(CommandId::prefix(name))
    }

    pub fn with_check(mut self, check: &'static str) -> Self {
        self.checks.push(check);
        self
    }

    pub fn with_attr(mut self, key: &str, value: Value) -> Self {
        self.attrs.insert(key.to_owned(), value);
        self
    }

    pub fn checks(&self) -> &[&'static str] {
        &self.checks
    }

    pub fn attrs(&self) -> &CommandAttrs {
        &self.attrs
    }
}

impl Command for TestCommand {
    type Check = &'static str;

    fn id(&self) -> CommandId {
        self.id.clone()
    }

    fn apply_defaults(&mut self, defaults: &CommandAttrs) {
        for (key, value) in defaults {
            self.attrs.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    fn prepend_checks(&mut self, checks: &[&'static str]) {
        self.checks.splice(0..0, checks.iter().copied());
    }
}

pub type TestListener = Arc<dyn Fn(&str) + Send + Sync>;

pub fn listener() -> TestListener {
    Arc::new(|_| {})
}

/// One recorded host call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AddCommand(String),
    RemoveCommand(String),
    AddListener(String),
    RemoveListener(String),
    Sync,
}

/// In-memory host recording every call made by the binder.
#[derive(Default)]
pub struct MockHost {
    commands: Mutex<Vec<TestCommand>>,
    listeners: Mutex<Vec<(String, TestListener)>>,
    calls: Mutex<Vec<Call>>,
    fail_on_command: Mutex<Option<String>>,
    fail_on_listener: Mutex<Option<String>>,
    fail_removals: Mutex<bool>,
    ready: AtomicBool,
    ready_notify: Notify,
}

impl MockHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes `add_command` fail for the command with this name.
    pub fn fail_on_command(&self, name: &str) {
        *self.fail_on_command.lock() = Some(name.to_owned());
    }

    /// Makes `add_listener` fail for listeners of this event.
    pub fn fail_on_listener(&self, event: &str) {
        *self.fail_on_listener.lock() = Some(event.to_owned());
    }

    /// Resolves every pending and future `wait_until_ready`.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
        self.ready_notify.notify_waiters();
    }

    /// Makes every removal call return an error.
    pub fn fail_removals(&self) {
        *self.fail_removals.lock() = true;
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands
            .lock()
            .iter()
            .map(|c| c.id().name().to_owned())
            .collect()
    }

    /// The attached copy of a command.
    pub fn command(&self, name: &str) -> Option<TestCommand> {
        self.commands
            .lock()
            .iter()
            .find(|c| c.id().name() == name)
            .cloned()
    }

    pub fn listener_events(&self) -> Vec<String> {
        self.listeners.lock().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn attach_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::AddCommand(_) | Call::AddListener(_)))
            .collect()
    }
}

impl Host for MockHost {
    type Command = TestCommand;
    type Listener = TestListener;

    fn add_command(&self, command: TestCommand) -> Result<(), BoxError> {
        let name = command.id().name().to_owned();
        self.calls.lock().push(Call::AddCommand(name.clone()));
        if self.fail_on_command.lock().as_deref() == Some(name.as_str()) {
            return Err(format!("host rejected '{name}'").into());
        }
        self.commands.lock().push(command);
        Ok(())
    }

    fn remove_command(&self, id: &CommandId) -> Result<Option<TestCommand>, BoxError> {
        self.calls.lock().push(Call::RemoveCommand(id.name().to_owned()));
        if *self.fail_removals.lock() {
            return Err("removal failed".into());
        }
        let mut commands = self.commands.lock();
        let pos = commands.iter().position(|c| &c.id() == id);
        Ok(pos.map(|p| commands.remove(p)))
    }

    fn add_listener(&self, event: &str, listener: TestListener) -> Result<(), BoxError> {
        self.calls.lock().push(Call::AddListener(event.to_owned()));
        if self.fail_on_listener.lock().as_deref() == Some(event) {
            return Err(format!("host rejected listener for '{event}'").into());
        }
        self.listeners.lock().push((event.to_owned(), listener));
        Ok(())
    }

    fn remove_listener(&self, event: &str, listener: &TestListener) -> Result<bool, BoxError> {
        self.calls.lock().push(Call::RemoveListener(event.to_owned()));
        if *self.fail_removals.lock() {
            return Err("removal failed".into());
        }
        let mut listeners = self.listeners.lock();
        let pos = listeners
            .iter()
            .position(|(e, l)| e == event && Arc::ptr_eq(l, listener));
        Ok(pos.map(|p| listeners.remove(p)).is_some())
    }

    fn schedule_command_sync(&self) {
        self.calls.lock().push(Call::Sync);
    }

    fn wait_until_ready(self: Arc<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let notified = self.ready_notify.notified();
            if self.ready.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        })
    }
}
