//! Extension loading on the host side.
//!
//! [`ExtensionManager`] plays the role of the host's extension loader. Each
//! extension is registered by name together with a factory producing its
//! [`Plugin`]. Loading runs the factory, wraps the plugin with
//! [`create_extension_handlers`], and calls `setup(host)`; unloading calls
//! `teardown(host)` on the same handlers. The factory runs again on every
//! load, so a reload always starts from a fresh container.
//!
//! All operations serialize on one async mutex: `setup` and `teardown` of an
//! extension never overlap, and each runs exactly once per load cycle.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = ExtensionManager::new(bot.clone());
//! manager.register("greetings", greetings::plugin).await?;
//! manager.apply_config(&config).await;
//! manager.start_all().await;
//! // ...later...
//! manager.stop_all().await;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use splice_core::{ExtensionHandlers, Extras, Host, Plugin, PluginResult, create_extension_handlers};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::config::SpliceConfig;
use crate::error::{RuntimeError, RuntimeResult};

/// Builds a fresh plugin for one load cycle.
pub type PluginFactory<H> = Arc<dyn Fn() -> PluginResult<Arc<Plugin<H>>> + Send + Sync>;

struct ExtensionEntry<H: Host> {
    name: String,
    factory: PluginFactory<H>,
    /// `Some` while loaded.
    handlers: Option<ExtensionHandlers<H>>,
}

struct ManagerState<H: Host> {
    /// Registration order.
    entries: Vec<ExtensionEntry<H>>,
    /// Names of loaded extensions, oldest first.
    load_order: Vec<String>,
    /// Startup order and extras from configuration.
    configured: Vec<(String, bool)>,
    extras: HashMap<String, Extras>,
}

impl<H: Host> ManagerState<H> {
    fn entry_mut(&mut self, name: &str) -> RuntimeResult<&mut ExtensionEntry<H>> {
        self.entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| RuntimeError::ExtensionNotFound(name.to_string()))
    }

    async fn load(&mut self, host: &Arc<H>, name: &str) -> RuntimeResult<()> {
        let extras = self.extras.get(name).cloned();
        let entry = self.entry_mut(name)?;
        if entry.handlers.is_some() {
            return Err(RuntimeError::AlreadyLoaded(name.to_string()));
        }

        let plugin = (entry.factory)()?;
        if let Some(extras) = extras {
            plugin.merge_extras(extras);
        }

        let handlers = create_extension_handlers(plugin);
        handlers.setup(Arc::clone(host)).await?;
        entry.handlers = Some(handlers);
        self.load_order.push(name.to_string());

        info!(extension = %name, "Extension loaded");
        Ok(())
    }

    /// The extension counts as unloaded even when teardown reports failures;
    /// the binder has detached everything by then.
    async fn unload(&mut self, host: &Arc<H>, name: &str) -> RuntimeResult<()> {
        let entry = self.entry_mut(name)?;
        let handlers = entry
            .handlers
            .take()
            .ok_or_else(|| RuntimeError::NotLoaded(name.to_string()))?;
        self.load_order.retain(|n| n != name);

        let result = handlers.teardown(Arc::clone(host)).await;
        info!(extension = %name, "Extension unloaded");
        result.map_err(Into::into)
    }
}

/// Loads and unloads named extensions against one host.
pub struct ExtensionManager<H: Host> {
    host: Arc<H>,
    state: AsyncMutex<ManagerState<H>>,
}

impl<H: Host> fmt::Debug for ExtensionManager<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionManager").finish_non_exhaustive()
    }
}

impl<H: Host> ExtensionManager<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            state: AsyncMutex::new(ManagerState {
                entries: Vec::new(),
                load_order: Vec::new(),
                configured: Vec::new(),
                extras: HashMap::new(),
            }),
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Registers an extension under `name`. It is not loaded yet.
    pub async fn register<F>(&self, name: impl Into<String>, factory: F) -> RuntimeResult<()>
    where
        F: Fn() -> PluginResult<Arc<Plugin<H>>> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut state = self.state.lock().await;
        if state.entries.iter().any(|e| e.name == name) {
            return Err(RuntimeError::ExtensionExists(name));
        }
        debug!(extension = %name, "Extension registered");
        state.entries.push(ExtensionEntry {
            name,
            factory: Arc::new(factory),
            handlers: None,
        });
        Ok(())
    }

    /// Records startup order, `enabled` flags, and extras from `config`.
    ///
    /// Extras are merged into the plugin on each subsequent load. Entries
    /// naming an unregistered extension are kept; `start_all` skips them.
    pub async fn apply_config(&self, config: &SpliceConfig) {
        let mut state = self.state.lock().await;
        state.configured = config
            .extensions
            .iter()
            .map(|e| (e.name.clone(), e.enabled))
            .collect();
        state.extras = config
            .extensions
            .iter()
            .map(|e| (e.name.clone(), e.extras.clone()))
            .collect();
    }

    /// Builds the extension's plugin and binds it to the host.
    ///
    /// On failure nothing stays attached and the extension remains unloaded.
    pub async fn load_extension(&self, name: &str) -> RuntimeResult<()> {
        let mut state = self.state.lock().await;
        state.load(&self.host, name).await
    }

    /// Unbinds the extension's plugin.
    ///
    /// Unload hook failures are returned, but the extension is unloaded
    /// regardless.
    pub async fn unload_extension(&self, name: &str) -> RuntimeResult<()> {
        let mut state = self.state.lock().await;
        state.unload(&self.host, name).await
    }

    /// Unloads the extension, then loads it again from a fresh plugin.
    ///
    /// Unload hook failures are logged and do not stop the reload.
    pub async fn reload_extension(&self, name: &str) -> RuntimeResult<()> {
        let mut state = self.state.lock().await;
        match state.unload(&self.host, name).await {
            Ok(()) => {}
            Err(RuntimeError::Plugin(e)) => {
                warn!(extension = %name, error = %e, "Unload failed during reload, continuing");
            }
            Err(e) => return Err(e),
        }
        state.load(&self.host, name).await
    }

    pub async fn is_loaded(&self, name: &str) -> bool {
        self.state.lock().await.load_order.iter().any(|n| n == name)
    }

    /// Names of loaded extensions in load order.
    pub async fn loaded_extensions(&self) -> Vec<String> {
        self.state.lock().await.load_order.clone()
    }

    /// Loads every enabled extension that is not loaded yet.
    ///
    /// Configured extensions load first, in configuration order, followed by
    /// unconfigured ones in registration order. A failing extension is logged
    /// and skipped; the failures are returned.
    pub async fn start_all(&self) -> Vec<(String, RuntimeError)> {
        let mut state = self.state.lock().await;

        let mut order: Vec<String> = Vec::new();
        for (name, enabled) in &state.configured {
            if !enabled {
                debug!(extension = %name, "Extension disabled, skipping");
            } else if state.entries.iter().any(|e| &e.name == name) {
                order.push(name.clone());
            } else {
                warn!(extension = %name, "Configured extension is not registered");
            }
        }
        for entry in &state.entries {
            if !state.configured.iter().any(|(n, _)| *n == entry.name) {
                order.push(entry.name.clone());
            }
        }

        let mut failures = Vec::new();
        for name in order {
            if state.load_order.contains(&name) {
                continue;
            }
            if let Err(e) = state.load(&self.host, &name).await {
                error!(extension = %name, error = %e, "Failed to load extension");
                failures.push((name, e));
            }
        }
        failures
    }

    /// Unloads every loaded extension, newest first.
    ///
    /// Continues past failures and returns them.
    pub async fn stop_all(&self) -> Vec<(String, RuntimeError)> {
        let mut state = self.state.lock().await;
        let order: Vec<String> = state.load_order.iter().rev().cloned().collect();

        let mut failures = Vec::new();
        for name in order {
            if let Err(e) = state.unload(&self.host, &name).await {
                error!(extension = %name, error = %e, "Failed to unload extension");
                failures.push((name, e));
            }
        }
        failures
    }
}
