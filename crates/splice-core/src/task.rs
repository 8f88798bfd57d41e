//! Background task loops owned by a plugin.
//!
//! A [`TaskLoop`] runs a hook at a fixed interval for as long as its plugin is
//! bound. The binder starts every registered loop once the plugin's entities
//! are attached and cancels them when the plugin is unbound or a bind is
//! rolled back.
//!
//! ```rust,ignore
//! plugin.register_loop(
//!     TaskLoop::every(Duration::from_secs(60), |bot: Arc<MyBot>| async move {
//!         bot.refresh_presence().await
//!     })
//!     .named("presence")
//!     .wait_until_ready(true),
//! );
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::hook::{Hook, IntoHook};
use crate::host::{BoxError, Host};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// A periodic job that runs while its plugin is bound.
pub struct TaskLoop<H> {
    name: Cow<'static, str>,
    every: Duration,
    wait_until_ready: bool,
    tick: Hook<H>,
}

impl<H> Clone for TaskLoop<H> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            every: self.every,
            wait_until_ready: self.wait_until_ready,
            tick: self.tick.clone(),
        }
    }
}

impl<H> fmt::Debug for TaskLoop<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskLoop")
            .field("name", &self.name)
            .field("every", &self.every)
            .field("wait_until_ready", &self.wait_until_ready)
            .finish_non_exhaustive()
    }
}

impl<H: Host> TaskLoop<H> {
    /// Runs `tick` every `interval`, starting immediately.
    ///
    /// `tick` accepts the same shapes as a lifecycle hook. A zero interval is
    /// raised to one millisecond.
    pub fn every<M, F: IntoHook<H, M>>(interval: Duration, tick: F) -> Self {
        let tick = tick.into_hook();
        Self {
            name: tick.id().name.clone(),
            every: interval.max(MIN_INTERVAL),
            wait_until_ready: false,
            tick,
        }
    }

    /// Replaces the name used in logs, which defaults to the tick's type name.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Delays the first tick until [`Host::wait_until_ready`] resolves.
    pub fn wait_until_ready(mut self, wait: bool) -> Self {
        self.wait_until_ready = wait;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.every
    }

    pub fn waits_until_ready(&self) -> bool {
        self.wait_until_ready
    }

    /// Spawns the loop on the current tokio runtime.
    ///
    /// A failing or panicking tick is logged and the loop carries on.
    pub(crate) fn start(&self, host: &Arc<H>) -> Result<RunningLoop, BoxError> {
        let runtime = tokio::runtime::Handle::try_current()?;
        let token = CancellationToken::new();
        let task = self.clone();
        let host = Arc::clone(host);
        let cancelled = token.clone();

        runtime.spawn(async move {
            tokio::select! {
                biased;
                () = cancelled.cancelled() => {
                    debug!(task = %task.name, "Task loop cancelled");
                }
                () = task.run(host) => {}
            }
        });

        Ok(RunningLoop {
            name: self.name.to_string(),
            token,
        })
    }

    async fn run(&self, host: Arc<H>) {
        if self.wait_until_ready {
            Arc::clone(&host).wait_until_ready().await;
        }

        let mut interval = tokio::time::interval(self.every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = self.tick.run(Arc::clone(&host)).await {
                warn!(task = %self.name, error = %e, "Task loop iteration failed");
            }
        }
    }
}

/// Handle to a started [`TaskLoop`].
#[derive(Debug)]
pub(crate) struct RunningLoop {
    pub(crate) name: String,
    token: CancellationToken,
}

impl RunningLoop {
    pub(crate) fn stop(&self) {
        self.token.cancel();
    }
}
