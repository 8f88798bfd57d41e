//! Attaching plugins to a host and detaching them again.
//!
//! # Bind
//!
//! 1. Fail with [`PluginError::AlreadyBound`] unless the plugin is unbound.
//! 2. Run pre-load hooks.
//! 3. Attach entities kind by kind in [`EntityKind::BIND_ORDER`]: commands
//!    (with plugin defaults and checks applied), then listeners, then task
//!    loops, each in registration order.
//! 4. On an attach error, detach everything attached so far (newest first)
//!    and fail with [`PluginError::BindFailed`].
//! 5. Run post-load hooks.
//! 6. Record the host and the attached entities.
//!
//! A failing or cancelled hook in step 2 or 5 detaches everything and fails
//! with [`PluginError::LoadHookFailed`].
//!
//! # Unbind
//!
//! 1. Return `Ok(())` if the plugin is not bound.
//! 2. Run pre-unload hooks in reverse order, collecting failures.
//! 3. Stop loops, then detach listeners, then commands, newest first. Every
//!    removal is attempted even if others fail.
//! 4. Run post-unload hooks in reverse order, collecting failures.
//! 5. Clear the bound host.
//! 6. Fail with [`PluginError::UnloadHooksFailed`] if any hook failed.
//!
//! Rollback and detach are owned by a drop guard, so dropping an in-flight
//! bind or unbind future still leaves the host clean and the plugin unbound.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::entity::{Command, EntityKind, EntityRef};
use crate::error::{PluginError, PluginResult};
use crate::hook::{HookChain, HookStage};
use crate::host::{BoxError, Host};
use crate::plugin::{Attached, Plugin, Snapshot};

/// Binds `plugin` to `host`.
pub async fn bind<H: Host>(plugin: &Plugin<H>, host: Arc<H>) -> PluginResult<()> {
    bind_with_cancellation(plugin, host, CancellationToken::new()).await
}

/// Binds `plugin` to `host`; firing `cancel` while a load hook is pending
/// aborts the bind with [`HookError::Cancelled`](crate::HookError::Cancelled)
/// and rolls back.
pub async fn bind_with_cancellation<H: Host>(
    plugin: &Plugin<H>,
    host: Arc<H>,
    cancel: CancellationToken,
) -> PluginResult<()> {
    plugin.begin_bind(&host)?;
    let snapshot = plugin.snapshot();
    let mut guard = Detach::new(plugin, &host, "rollback");

    run_load_stage(&mut guard, &snapshot.hooks, HookStage::PreLoad, &cancel).await?;

    for kind in EntityKind::BIND_ORDER {
        if let Err((entity, source)) = attach(kind, &snapshot, &host, &mut guard.attached) {
            warn!(
                plugin      = %plugin.name(),
                entity_kind = %entity.kind(),
                entity      = %entity,
                error       = %source,
                "Attach failed, rolling back"
            );
            guard.run();
            return Err(PluginError::BindFailed {
                plugin: plugin.name().to_owned(),
                entity,
                source,
            });
        }
    }

    run_load_stage(&mut guard, &snapshot.hooks, HookStage::PostLoad, &cancel).await?;

    guard.attached.hooks = snapshot.hooks;
    let attached = guard.disarm();
    info!(
        plugin = %plugin.name(),
        commands = attached.commands.len(),
        listeners = attached.listeners.len(),
        loops = attached.loops.len(),
        "Plugin loaded"
    );
    plugin.finish_bind(Arc::clone(&host), attached);
    host.schedule_command_sync();
    Ok(())
}

/// Runs one load stage, rolling back through `guard` on failure.
async fn run_load_stage<H: Host>(
    guard: &mut Detach<'_, H>,
    hooks: &HookChain<H>,
    stage: HookStage,
    cancel: &CancellationToken,
) -> PluginResult<()> {
    let host = guard.host;
    hooks.run_load(stage, host, cancel).await.map_err(|(hook, source)| {
        guard.run();
        PluginError::LoadHookFailed {
            plugin: guard.plugin.name().to_owned(),
            hook,
            source,
        }
    })
}

/// Attaches every entity of one kind, recording each in `attached` as soon as
/// the host accepts it.
fn attach<H: Host>(
    kind: EntityKind,
    snapshot: &Snapshot<H>,
    host: &Arc<H>,
    attached: &mut Attached<H>,
) -> Result<(), (EntityRef, BoxError)> {
    match kind {
        EntityKind::Command => {
            for command in snapshot.registry.commands() {
                let command = snapshot.prepare(command);
                host.add_command(command.clone())
                    .map_err(|e| (EntityRef::Command(command.id()), e))?;
                attached.commands.push(command);
            }
        }
        EntityKind::Listener => {
            for (event, listener) in snapshot.registry.listeners() {
                host.add_listener(event, listener.clone()).map_err(|e| {
                    let entity = EntityRef::Listener {
                        event: event.to_owned(),
                    };
                    (entity, e)
                })?;
                attached.listeners.push((event.to_owned(), listener.clone()));
            }
        }
        EntityKind::Loop => {
            for task in &snapshot.loops {
                let running = task.start(host).map_err(|e| {
                    let entity = EntityRef::Loop {
                        name: task.name().to_owned(),
                    };
                    (entity, e)
                })?;
                attached.loops.push(running);
            }
        }
    }
    Ok(())
}

/// Unbinds `plugin` from its host. A no-op if it is not bound.
pub async fn unbind<H: Host>(plugin: &Plugin<H>) -> PluginResult<()> {
    let Some((host, mut attached)) = plugin.begin_unbind() else {
        debug!(plugin = %plugin.name(), "Unbind requested on an unbound plugin");
        return Ok(());
    };

    let hooks = std::mem::take(&mut attached.hooks);
    let mut guard = Detach::new(plugin, &host, "unload");
    guard.attached = attached;

    let mut failures = hooks.run_unload(HookStage::PreUnload, &host).await;
    guard.detach();
    failures.extend(hooks.run_unload(HookStage::PostUnload, &host).await);

    guard.run();
    host.schedule_command_sync();

    if failures.is_empty() {
        info!(plugin = %plugin.name(), "Plugin unloaded");
        Ok(())
    } else {
        Err(PluginError::UnloadHooksFailed {
            plugin: plugin.name().to_owned(),
            failures,
        })
    }
}

// =============================================================================
// Detach guard
// =============================================================================

/// Detaches recorded entities and marks the plugin unbound, either on
/// [`run`](Detach::run) or on drop.
struct Detach<'a, H: Host> {
    plugin: &'a Plugin<H>,
    host: &'a Arc<H>,
    reason: &'static str,
    attached: Attached<H>,
    armed: bool,
}

impl<'a, H: Host> Detach<'a, H> {
    fn new(plugin: &'a Plugin<H>, host: &'a Arc<H>, reason: &'static str) -> Self {
        Self {
            plugin,
            host,
            reason,
            attached: Attached::default(),
            armed: true,
        }
    }

    /// Keeps everything attached and returns the record.
    fn disarm(mut self) -> Attached<H> {
        self.armed = false;
        std::mem::take(&mut self.attached)
    }

    /// Detaches everything recorded so far and marks the plugin unbound.
    fn run(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        self.detach();
        self.plugin.reset();
    }

    /// Detaches everything recorded so far, walking [`EntityKind::BIND_ORDER`]
    /// backwards. The plugin stays in its current state.
    fn detach(&mut self) {
        let attached = std::mem::take(&mut self.attached);
        if attached.is_empty() {
            return;
        }
        debug!(
            plugin = %self.plugin.name(),
            reason = self.reason,
            commands = attached.commands.len(),
            listeners = attached.listeners.len(),
            loops = attached.loops.len(),
            "Detaching entities"
        );

        for kind in EntityKind::BIND_ORDER.into_iter().rev() {
            self.detach_kind(kind, &attached);
        }
    }

    fn detach_kind(&self, kind: EntityKind, attached: &Attached<H>) {
        let plugin = self.plugin.name();
        match kind {
            EntityKind::Loop => {
                for running in attached.loops.iter().rev() {
                    running.stop();
                    debug!(plugin = %plugin, task = %running.name, "Loop stopped");
                }
            }
            EntityKind::Listener => {
                for (event, listener) in attached.listeners.iter().rev() {
                    match self.host.remove_listener(event, listener) {
                        Ok(true) => {}
                        Ok(false) => {
                            debug!(plugin = %plugin, event = %event, "Listener already detached");
                        }
                        Err(e) => {
                            warn!(
                                plugin = %plugin,
                                event  = %event,
                                error  = %e,
                                "Failed to detach listener"
                            );
                        }
                    }
                }
            }
            EntityKind::Command => {
                for command in attached.commands.iter().rev() {
                    let id = command.id();
                    match self.host.remove_command(&id) {
                        Ok(Some(_)) => {}
                        Ok(None) => {
                            debug!(plugin = %plugin, command = %id, "Command already detached");
                        }
                        Err(e) => {
                            warn!(
                                plugin  = %plugin,
                                command = %id,
                                error   = %e,
                                "Failed to detach command"
                            );
                        }
                    }
                }
            }
        }
    }
}

impl<H: Host> Drop for Detach<'_, H> {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                plugin = %self.plugin.name(),
                reason = self.reason,
                "Lifecycle future dropped mid-flight, detaching"
            );
            self.run();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future;
    use parking_lot::Mutex;
    use tokio_test::{assert_err, assert_ok};

    use serde_json::json;

    use crate::entity::{CommandAttrs, CommandId, CommandKind};
    use crate::error::HookError;
    use crate::task::TaskLoop;
    use crate::testing::{Call, MockHost, TestCommand, listener};

    fn counting_loop(ticks: &Arc<AtomicUsize>) -> TaskLoop<MockHost> {
        let ticks = Arc::clone(ticks);
        TaskLoop::every(Duration::from_millis(2), move || {
            ticks.fetch_add(1, Ordering::SeqCst);
        })
        .named("counter")
    }

    fn plugin_with(names: &[&'static str]) -> Plugin<MockHost> {
        let p = Plugin::new("test");
        for name in names {
            p.command(TestCommand::slash(*name)).unwrap();
        }
        p
    }

    #[tokio::test]
    async fn test_bind_attaches_commands_before_listeners() {
        let p = plugin_with(&["a"]);
        p.listener("on_ready", listener());
        p.command(TestCommand::slash("b")).unwrap();

        let host = MockHost::new();
        assert_ok!(bind(&p, Arc::clone(&host)).await);
        assert_eq!(
            host.attach_calls(),
            [
                Call::AddCommand("a".into()),
                Call::AddCommand("b".into()),
                Call::AddListener("on_ready".into()),
            ]
        );
        assert!(p.is_bound());
        assert!(Arc::ptr_eq(&p.host().unwrap(), &host));
        assert_eq!(host.calls().last(), Some(&Call::Sync));
    }

    #[tokio::test]
    async fn test_extended_plugin_attaches_union_in_order() {
        let c1 = plugin_with(&["one", "two"]);
        c1.listener("on_message", listener());
        let c2 = plugin_with(&["three"]);
        c2.listener("on_ready", listener());

        c1.extend(&c2).unwrap();
        let host = MockHost::new();
        bind(&c1, Arc::clone(&host)).await.unwrap();

        assert_eq!(host.command_names(), ["one", "two", "three"]);
        assert_eq!(host.listener_events(), ["on_message", "on_ready"]);
    }

    #[tokio::test]
    async fn test_second_bind_is_rejected() {
        let p = plugin_with(&["ping"]);
        let host = MockHost::new();
        bind(&p, Arc::clone(&host)).await.unwrap();

        let err = assert_err!(bind(&p, Arc::clone(&host)).await);
        assert!(matches!(err, PluginError::AlreadyBound { .. }));
        assert_eq!(host.command_names(), ["ping"]);
        assert_eq!(host.attach_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_attach_rolls_back() {
        let p = plugin_with(&["c1", "c2", "c3", "c4", "c5"]);
        let host = MockHost::new();
        host.fail_on_command("c3");

        let err = bind(&p, Arc::clone(&host)).await.unwrap_err();
        match err {
            PluginError::BindFailed { entity, .. } => {
                assert_eq!(entity, EntityRef::Command(CommandId::slash("c3")));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(host.command_names().is_empty());

        let removed: Vec<_> = host
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::RemoveCommand(_)))
            .collect();
        assert_eq!(
            removed,
            [Call::RemoveCommand("c2".into()), Call::RemoveCommand("c1".into())]
        );
        assert!(!p.is_bound());
    }

    #[tokio::test]
    async fn test_failed_load_hook_rolls_back() {
        let p = plugin_with(&["ping"]);
        p.listener("on_ready", listener());
        p.load_hook(|| async { Err::<(), _>(io::Error::other("no database")) });

        let host = MockHost::new();
        let err = bind(&p, Arc::clone(&host)).await.unwrap_err();
        assert!(matches!(
            err,
            PluginError::LoadHookFailed { ref hook, source: HookError::Failed(_), .. } if hook.index == 0
        ));
        assert!(host.command_names().is_empty());
        assert!(host.listener_events().is_empty());
        assert!(!p.is_bound());

        // A failed bind leaves the plugin reusable.
        let p2 = plugin_with(&["ping"]);
        assert_ok!(bind(&p2, host).await);
    }

    #[tokio::test]
    async fn test_cancelled_load_hook_rolls_back() {
        let p = plugin_with(&["ping"]);
        p.load_hook(|| future::pending::<()>());

        let host = MockHost::new();
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cancel.cancel();
        });

        let err = bind_with_cancellation(&p, Arc::clone(&host), token)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PluginError::LoadHookFailed { source: HookError::Cancelled, .. }
        ));
        assert!(host.command_names().is_empty());
        assert!(!p.is_bound());
    }

    #[tokio::test]
    async fn test_dropped_bind_future_rolls_back() {
        let p = plugin_with(&["ping"]);
        p.load_hook(|| future::pending::<()>());
        let host = MockHost::new();

        let timed_out =
            tokio::time::timeout(Duration::from_millis(5), bind(&p, Arc::clone(&host))).await;
        assert!(timed_out.is_err());
        assert!(host.command_names().is_empty());
        assert!(!p.is_bound());
    }

    #[tokio::test]
    async fn test_load_hook_receives_bound_host() {
        let p: Arc<Plugin<MockHost>> = Arc::new(plugin_with(&[]));
        let seen: Arc<Mutex<Vec<Arc<MockHost>>>> = Arc::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let seen_clone = Arc::clone(&seen);
        p.load_hook(move |host: Arc<MockHost>| {
            let seen = Arc::clone(&seen_clone);
            async move {
                seen.lock().push(host);
            }
        });
        let calls_clone = Arc::clone(&calls);
        let p_clone = Arc::clone(&p);
        p.load_hook(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            assert!(p_clone.host().is_ok());
        });

        let host = MockHost::new();
        bind(&p, Arc::clone(&host)).await.unwrap();
        assert!(Arc::ptr_eq(&seen.lock()[0], &host));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unbind_never_bound_is_noop() {
        let p = plugin_with(&["ping"]);
        p.unload_hook(|| -> Result<(), io::Error> { panic!("must not run") });
        assert_ok!(unbind(&p).await);
        assert_ok!(unbind(&p).await);
    }

    #[tokio::test]
    async fn test_unbind_runs_all_hooks_and_detaches() {
        let p = plugin_with(&["ping"]);
        p.listener("on_ready", listener());
        let ran: Arc<Mutex<Vec<usize>>> = Arc::default();
        for i in 1..=3 {
            let ran = Arc::clone(&ran);
            p.unload_hook(move || -> Result<(), io::Error> {
                ran.lock().push(i);
                if i == 2 {
                    Err(io::Error::other("hook 2 failed"))
                } else {
                    Ok(())
                }
            });
        }

        let host = MockHost::new();
        bind(&p, Arc::clone(&host)).await.unwrap();
        let err = unbind(&p).await.unwrap_err();

        assert_eq!(*ran.lock(), [3, 2, 1]);
        match err {
            PluginError::UnloadHooksFailed { failures, .. } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].hook.index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(host.command_names().is_empty());
        assert!(host.listener_events().is_empty());
        assert!(!p.is_bound());
    }

    #[tokio::test]
    async fn test_unload_hooks_see_attached_entities() {
        let p = Arc::new(plugin_with(&["ping"]));
        let observed = Arc::new(AtomicUsize::new(usize::MAX));
        let observed_clone = Arc::clone(&observed);
        p.unload_hook(move |host: Arc<MockHost>| {
            observed_clone.store(host.command_names().len(), Ordering::SeqCst);
        });

        let host = MockHost::new();
        bind(&p, Arc::clone(&host)).await.unwrap();
        unbind(&p).await.unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unbind_tolerates_removal_errors() {
        let p = plugin_with(&["a", "b"]);
        p.listener("on_ready", listener());
        let host = MockHost::new();
        bind(&p, Arc::clone(&host)).await.unwrap();

        host.fail_removals();
        assert_ok!(unbind(&p).await);

        let removals: Vec<_> = host
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::RemoveCommand(_) | Call::RemoveListener(_)))
            .collect();
        assert_eq!(
            removals,
            [
                Call::RemoveListener("on_ready".into()),
                Call::RemoveCommand("b".into()),
                Call::RemoveCommand("a".into()),
            ]
        );
        assert!(!p.is_bound());
    }

    #[tokio::test]
    async fn test_registration_while_bound_waits_for_next_cycle() {
        let p = plugin_with(&["first"]);
        let host = MockHost::new();
        bind(&p, Arc::clone(&host)).await.unwrap();

        p.command(TestCommand::slash("late")).unwrap();
        let late_hook_runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&late_hook_runs);
        p.unload_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(host.command_names(), ["first"]);

        unbind(&p).await.unwrap();
        assert!(
            !host
                .calls()
                .contains(&Call::RemoveCommand("late".into()))
        );
        assert_eq!(late_hook_runs.load(Ordering::SeqCst), 0);

        bind(&p, Arc::clone(&host)).await.unwrap();
        assert_eq!(host.command_names(), ["first", "late"]);
    }

    #[tokio::test]
    async fn test_failed_listener_attach_rolls_back_commands() {
        let p = plugin_with(&["a", "b"]);
        p.listener("on_ready", listener());
        p.listener("on_message", listener());
        let host = MockHost::new();
        host.fail_on_listener("on_message");

        let err = assert_err!(bind(&p, Arc::clone(&host)).await);
        match err {
            PluginError::BindFailed { entity, .. } => {
                assert_eq!(entity.kind(), EntityKind::Listener);
                assert_eq!(
                    entity,
                    EntityRef::Listener {
                        event: "on_message".into()
                    }
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(host.command_names().is_empty());
        assert!(host.listener_events().is_empty());
        assert!(!host.calls().contains(&Call::Sync));
        assert!(!p.is_bound());
    }

    #[tokio::test]
    async fn test_hook_stages_bracket_attach_and_detach() {
        let p = plugin_with(&["ping"]);
        let seen: Arc<Mutex<Vec<(&'static str, usize)>>> = Arc::default();
        for stage in HookStage::ALL {
            let seen = Arc::clone(&seen);
            p.hook(stage, move |host: Arc<MockHost>| {
                seen.lock().push((stage.as_str(), host.command_names().len()));
            });
        }

        let host = MockHost::new();
        bind(&p, Arc::clone(&host)).await.unwrap();
        unbind(&p).await.unwrap();
        assert_eq!(
            *seen.lock(),
            [
                ("pre-load", 0),
                ("post-load", 1),
                ("pre-unload", 1),
                ("post-unload", 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_pre_load_hook_attaches_nothing() {
        let p = plugin_with(&["ping"]);
        p.pre_load_hook(|| Err::<(), _>(io::Error::other("not configured")));

        let host = MockHost::new();
        let err = assert_err!(bind(&p, Arc::clone(&host)).await);
        assert!(matches!(
            err,
            PluginError::LoadHookFailed { ref hook, .. } if hook.stage == HookStage::PreLoad
        ));
        assert!(host.attach_calls().is_empty());
        assert!(!p.is_bound());
    }

    #[tokio::test]
    async fn test_checks_and_defaults_apply_to_attached_copy() {
        let p = Plugin::<MockHost>::builder("p")
            .command_attrs(
                CommandKind::Slash,
                CommandAttrs::from_iter([("nsfw".to_owned(), json!(false))]),
            )
            .build();
        p.slash_command_check("in_guild");
        p.command(TestCommand::slash("ban").with_check("is_mod"))
            .unwrap();
        p.command(TestCommand::prefix("ping").with_check("cooldown"))
            .unwrap();

        let host = MockHost::new();
        bind(&p, Arc::clone(&host)).await.unwrap();
        let ban = host.command("ban").unwrap();
        assert_eq!(ban.checks(), ["in_guild", "is_mod"]);
        assert_eq!(ban.attrs().get("nsfw"), Some(&json!(false)));
        assert_eq!(host.command("ping").unwrap().checks(), ["cooldown"]);

        let registered = p.get_command(CommandKind::Slash, "ban").unwrap();
        assert_eq!(registered.checks(), ["is_mod"]);
        assert!(registered.attrs().is_empty());

        // Checks are applied per bind, not accumulated across reloads.
        unbind(&p).await.unwrap();
        bind(&p, Arc::clone(&host)).await.unwrap();
        assert_eq!(host.command("ban").unwrap().checks(), ["in_guild", "is_mod"]);
    }

    #[tokio::test]
    async fn test_loop_runs_only_while_bound() {
        let p = plugin_with(&[]);
        let ticks = Arc::new(AtomicUsize::new(0));
        p.register_loop(counting_loop(&ticks));

        let host = MockHost::new();
        bind(&p, Arc::clone(&host)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ticks.load(Ordering::SeqCst) >= 1);

        unbind(&p).await.unwrap();
        let after = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), after);
    }

    #[tokio::test]
    async fn test_loop_cancelled_when_post_load_hook_fails() {
        let p = plugin_with(&[]);
        let ticks = Arc::new(AtomicUsize::new(0));
        p.register_loop(counting_loop(&ticks));
        p.load_hook(|| Err::<(), _>(io::Error::other("nope")));

        let err = assert_err!(bind(&p, MockHost::new()).await);
        assert!(matches!(err, PluginError::LoadHookFailed { .. }));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_loop_waits_until_host_ready() {
        let p = plugin_with(&[]);
        let ticks = Arc::new(AtomicUsize::new(0));
        p.register_loop(counting_loop(&ticks).wait_until_ready(true));

        let host = MockHost::new();
        bind(&p, Arc::clone(&host)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        host.set_ready();
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(ticks.load(Ordering::SeqCst) >= 1);
        unbind(&p).await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_unload_hook_does_not_skip_the_rest() {
        let p = Arc::new(plugin_with(&["ping"]));
        let ran: Arc<Mutex<Vec<usize>>> = Arc::default();
        for i in 1..=3 {
            let ran = Arc::clone(&ran);
            p.unload_hook(move || {
                ran.lock().push(i);
                if i == 2 {
                    panic!("unload hook {i} panicked");
                }
            });
        }

        let host = MockHost::new();
        let task = {
            let p = Arc::clone(&p);
            let host = Arc::clone(&host);
            tokio::spawn(async move {
                bind(&p, host).await?;
                unbind(&p).await
            })
        };
        let err = task.await.unwrap().unwrap_err();

        assert_eq!(*ran.lock(), [3, 2, 1]);
        match err {
            PluginError::UnloadHooksFailed { failures, .. } => {
                assert_eq!(failures.len(), 1);
                assert!(matches!(failures[0].error, HookError::Panicked(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(host.command_names().is_empty());
        assert!(!p.is_bound());
    }
}
