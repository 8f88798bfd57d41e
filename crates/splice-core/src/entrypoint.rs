//! The `setup` / `teardown` pair handed to an extension loader.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::warn;

use crate::binder;
use crate::error::PluginResult;
use crate::host::Host;
use crate::plugin::Plugin;

/// Binds the captured plugin to the given host.
pub type SetupFn<H> = Arc<dyn Fn(Arc<H>) -> BoxFuture<'static, PluginResult<()>> + Send + Sync>;

/// Unbinds the captured plugin from the host it was bound to. A different
/// host argument is logged and otherwise ignored.
pub type TeardownFn<H> = Arc<dyn Fn(Arc<H>) -> BoxFuture<'static, PluginResult<()>> + Send + Sync>;

/// Entry points of one extension, closing over a single plugin.
pub struct ExtensionHandlers<H: Host> {
    plugin: Arc<Plugin<H>>,
    setup: SetupFn<H>,
    teardown: TeardownFn<H>,
}

impl<H: Host> Clone for ExtensionHandlers<H> {
    fn clone(&self) -> Self {
        Self {
            plugin: Arc::clone(&self.plugin),
            setup: Arc::clone(&self.setup),
            teardown: Arc::clone(&self.teardown),
        }
    }
}

impl<H: Host> fmt::Debug for ExtensionHandlers<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionHandlers")
            .field("plugin", &self.plugin.name())
            .finish_non_exhaustive()
    }
}

impl<H: Host> ExtensionHandlers<H> {
    pub async fn setup(&self, host: Arc<H>) -> PluginResult<()> {
        (self.setup)(host).await
    }

    pub async fn teardown(&self, host: Arc<H>) -> PluginResult<()> {
        (self.teardown)(host).await
    }

    /// The plugin both handlers close over.
    pub fn plugin(&self) -> &Arc<Plugin<H>> {
        &self.plugin
    }

    /// Splits into the raw `(setup, teardown)` callables.
    pub fn into_parts(self) -> (SetupFn<H>, TeardownFn<H>) {
        (self.setup, self.teardown)
    }
}

/// Creates the `setup` / `teardown` pair for `plugin`.
///
/// `setup(host)` binds the plugin to `host`; `teardown(host)` unbinds it from
/// whichever host it is bound to.
pub fn create_extension_handlers<H: Host>(plugin: Arc<Plugin<H>>) -> ExtensionHandlers<H> {
    let for_setup = Arc::clone(&plugin);
    let setup: SetupFn<H> = Arc::new(move |host| {
        let plugin = Arc::clone(&for_setup);
        async move { binder::bind(&plugin, host).await }.boxed()
    });

    let for_teardown = Arc::clone(&plugin);
    let teardown: TeardownFn<H> = Arc::new(move |host| {
        let plugin = Arc::clone(&for_teardown);
        async move {
            if let Ok(bound) = plugin.host()
                && !Arc::ptr_eq(&bound, &host)
            {
                warn!(
                    plugin = %plugin.name(),
                    "Teardown called with a host other than the bound one, unbinding the bound host"
                );
            }
            binder::unbind(&plugin).await
        }
        .boxed()
    });

    ExtensionHandlers {
        plugin,
        setup,
        teardown,
    }
}
