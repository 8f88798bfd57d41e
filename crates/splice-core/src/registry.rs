//! Ordered entity registries.
//!
//! Iteration order equals registration order for every kind; the binder relies
//! on it for deterministic attach order.

use indexmap::IndexMap;
use indexmap::map::Entry;
use thiserror::Error;

use crate::entity::{Command, CommandId, Listener};

/// A command identity was registered twice.
#[derive(Debug, Clone, Error)]
#[error("duplicate {0}")]
pub struct DuplicateIdentity(pub CommandId);

/// Commands keyed by identity plus listeners grouped under event names.
#[derive(Debug, Clone)]
pub struct EntityRegistry<C, L> {
    commands: IndexMap<CommandId, C>,
    listeners: Vec<(String, L)>,
}

impl<C, L> Default for EntityRegistry<C, L> {
    fn default() -> Self {
        Self {
            commands: IndexMap::new(),
            listeners: Vec::new(),
        }
    }
}

impl<C: Command, L: Listener> EntityRegistry<C, L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command. Fails if its identity is taken.
    pub fn register_command(&mut self, command: C) -> Result<(), DuplicateIdentity> {
        match self.commands.entry(command.id()) {
            Entry::Occupied(e) => Err(DuplicateIdentity(e.key().clone())),
            Entry::Vacant(e) => {
                e.insert(command);
                Ok(())
            }
        }
    }

    /// Appends a listener. Several listeners per event are allowed.
    pub fn register_listener(&mut self, event: impl Into<String>, listener: L) {
        self.listeners.push((event.into(), listener));
    }

    /// Removes a command, keeping the order of the rest.
    pub fn unregister_command(&mut self, id: &CommandId) -> Option<C> {
        self.commands.shift_remove(id)
    }

    /// Removes the first registration of `listener` under `event`.
    pub fn unregister_listener(&mut self, event: &str, listener: &L) -> Option<L> {
        let pos = self
            .listeners
            .iter()
            .position(|(e, l)| e == event && l.same_callback(listener))?;
        Some(self.listeners.remove(pos).1)
    }

    pub fn command(&self, id: &CommandId) -> Option<&C> {
        self.commands.get(id)
    }

    pub fn commands(&self) -> impl ExactSizeIterator<Item = &C> {
        self.commands.values()
    }

    pub fn listeners(&self) -> impl ExactSizeIterator<Item = (&str, &L)> {
        self.listeners.iter().map(|(e, l)| (e.as_str(), l))
    }

    pub fn listeners_for<'a>(&'a self, event: &'a str) -> impl Iterator<Item = &'a L> + 'a {
        self.listeners
            .iter()
            .filter(move |(e, _)| e == event)
            .map(|(_, l)| l)
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn len(&self) -> usize {
        self.commands.len() + self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.listeners.is_empty()
    }

    /// Appends copies of `other`'s entries after this registry's own.
    ///
    /// Every command identity is checked before anything is inserted, so on
    /// error `self` is left untouched.
    pub fn merge(&mut self, other: &Self) -> Result<(), DuplicateIdentity> {
        if let Some(id) = other.commands.keys().find(|id| self.commands.contains_key(*id)) {
            return Err(DuplicateIdentity(id.clone()));
        }

        self.commands.extend(
            other
                .commands
                .iter()
                .map(|(id, c)| (id.clone(), c.clone())),
        );
        self.listeners.extend(other.listeners.iter().cloned());
        Ok(())
    }
}
