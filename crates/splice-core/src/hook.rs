//! Lifecycle hooks.
//!
//! A hook is any callable run when a plugin is loaded or unloaded. It may be
//! synchronous or asynchronous, and it may take the host handle as its only
//! argument or take nothing. The shape is detected at compile time through
//! the marker parameter of [`IntoHook`], in the same way handler arities are
//! resolved elsewhere in the framework.
//!
//! Each hook belongs to one [`HookStage`]: pre-load hooks run before anything
//! is attached, post-load hooks after, pre-unload hooks before anything is
//! detached, and post-unload hooks after. A hook that panics is reported as
//! [`HookError::Panicked`] like any other failure.
//!
//! ```rust,ignore
//! plugin.load_hook(|| println!("loading"));
//! plugin.load_hook(|bot: Arc<MyBot>| async move { bot.connect_db().await });
//! plugin.unload_hook(close_session); // async fn close_session() -> anyhow::Result<()>
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{HookError, HookFailure};
use crate::host::BoxError;

// ============================================================================
// HookStage / HookId
// ============================================================================

/// When a hook runs relative to attaching or detaching entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    /// Before any entity is attached.
    PreLoad,
    /// After every entity is attached.
    PostLoad,
    /// Before any entity is detached.
    PreUnload,
    /// After every entity is detached.
    PostUnload,
}

impl HookStage {
    pub const ALL: [HookStage; 4] = [
        HookStage::PreLoad,
        HookStage::PostLoad,
        HookStage::PreUnload,
        HookStage::PostUnload,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreLoad => "pre-load",
            Self::PostLoad => "post-load",
            Self::PreUnload => "pre-unload",
            Self::PostUnload => "post-unload",
        }
    }

    pub fn is_load(self) -> bool {
        matches!(self, Self::PreLoad | Self::PostLoad)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a hook: its stage, its position within that stage, and the
/// callable's type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookId {
    pub stage: HookStage,
    pub index: usize,
    pub name: Cow<'static, str>,
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} hook #{} ({})", self.stage, self.index, self.name)
    }
}

// ============================================================================
// IntoHookResult
// ============================================================================

/// Return types a hook may produce.
pub trait IntoHookResult: Send + 'static {
    fn into_hook_result(self) -> Result<(), BoxError>;
}

impl IntoHookResult for () {
    fn into_hook_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E> IntoHookResult for Result<(), E>
where
    E: Into<BoxError> + Send + 'static,
{
    fn into_hook_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

// ============================================================================
// Hook
// ============================================================================

type HookCall<H> = Arc<dyn Fn(Arc<H>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// A type-erased lifecycle hook.
pub struct Hook<H> {
    id: HookId,
    wants_host: bool,
    is_async: bool,
    call: HookCall<H>,
}

impl<H> Clone for Hook<H> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            wants_host: self.wants_host,
            is_async: self.is_async,
            call: Arc::clone(&self.call),
        }
    }
}

impl<H> fmt::Debug for Hook<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("id", &self.id)
            .field("wants_host", &self.wants_host)
            .field("is_async", &self.is_async)
            .finish_non_exhaustive()
    }
}

impl<H: Send + Sync + 'static> Hook<H> {
    fn new<F>(name: &'static str, wants_host: bool, is_async: bool, call: F) -> Self
    where
        F: Fn(Arc<H>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync + 'static,
    {
        Self {
            id: HookId {
                stage: HookStage::PostLoad,
                index: 0,
                name: Cow::Borrowed(name),
            },
            wants_host,
            is_async,
            call: Arc::new(call),
        }
    }

    pub fn id(&self) -> &HookId {
        &self.id
    }

    /// Whether the hook declared the host as its argument.
    pub fn wants_host(&self) -> bool {
        self.wants_host
    }

    /// Whether the hook returns a future that must be awaited.
    pub fn is_async(&self) -> bool {
        self.is_async
    }

    /// Runs the hook. The host is only forwarded if the hook asked for it.
    pub fn invoke(&self, host: Arc<H>) -> BoxFuture<'static, Result<(), BoxError>> {
        (self.call)(host)
    }

    /// Runs the hook, catching a panic raised while it is called or polled.
    pub async fn run(&self, host: Arc<H>) -> Result<(), HookError> {
        let fut = std::panic::catch_unwind(AssertUnwindSafe(|| self.invoke(host)))
            .map_err(HookError::from_panic)?;
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(res) => res.map_err(HookError::Failed),
            Err(payload) => Err(HookError::from_panic(payload)),
        }
    }
}

// ============================================================================
// IntoHook
// ============================================================================

/// Markers distinguishing the four accepted hook shapes.
#[doc(hidden)]
pub mod marker {
    pub struct Blocking;
    pub struct Awaited;
    pub struct NoHost;
    pub struct WithHost;
}

/// Conversion from a callable into a [`Hook`].
///
/// Implemented for
/// - `Fn() -> R` and `Fn(Arc<H>) -> R`, run synchronously
/// - `Fn() -> Fut` and `Fn(Arc<H>) -> Fut`, awaited
///
/// where `R` (or `Fut::Output`) is `()` or `Result<(), E>` with
/// `E: Into<BoxError>`. Closures taking the host need an annotated parameter
/// (`|bot: Arc<MyBot>| ...`) so the shape can be inferred.
pub trait IntoHook<H, Marker>: Clone + Send + Sync + 'static {
    fn into_hook(self) -> Hook<H>;
}

impl<H, F, R> IntoHook<H, (marker::Blocking, marker::NoHost)> for F
where
    H: Send + Sync + 'static,
    F: Fn() -> R + Clone + Send + Sync + 'static,
    R: IntoHookResult,
{
    fn into_hook(self) -> Hook<H> {
        Hook::new(std::any::type_name::<F>(), false, false, move |_host| {
            future::ready(self().into_hook_result()).boxed()
        })
    }
}

impl<H, F, R> IntoHook<H, (marker::Blocking, marker::WithHost)> for F
where
    H: Send + Sync + 'static,
    F: Fn(Arc<H>) -> R + Clone + Send + Sync + 'static,
    R: IntoHookResult,
{
    fn into_hook(self) -> Hook<H> {
        Hook::new(std::any::type_name::<F>(), true, false, move |host| {
            future::ready(self(host).into_hook_result()).boxed()
        })
    }
}

impl<H, F, Fut> IntoHook<H, (marker::Awaited, marker::NoHost)> for F
where
    H: Send + Sync + 'static,
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHookResult,
{
    fn into_hook(self) -> Hook<H> {
        Hook::new(std::any::type_name::<F>(), false, true, move |_host| {
            self().map(IntoHookResult::into_hook_result).boxed()
        })
    }
}

impl<H, F, Fut> IntoHook<H, (marker::Awaited, marker::WithHost)> for F
where
    H: Send + Sync + 'static,
    F: Fn(Arc<H>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoHookResult,
{
    fn into_hook(self) -> Hook<H> {
        Hook::new(std::any::type_name::<F>(), true, true, move |host| {
            self(host).map(IntoHookResult::into_hook_result).boxed()
        })
    }
}

// ============================================================================
// HookChain
// ============================================================================

/// The hooks of one plugin, ordered within each [`HookStage`].
pub struct HookChain<H> {
    stages: [Vec<Hook<H>>; 4],
}

impl<H> Default for HookChain<H> {
    fn default() -> Self {
        Self {
            stages: Default::default(),
        }
    }
}

impl<H> Clone for HookChain<H> {
    fn clone(&self) -> Self {
        Self {
            stages: self.stages.clone(),
        }
    }
}

impl<H: Send + Sync + 'static> HookChain<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `hook` to `stage`, assigning its stage and index.
    pub fn push(&mut self, stage: HookStage, mut hook: Hook<H>) {
        let hooks = &mut self.stages[stage.slot()];
        hook.id.stage = stage;
        hook.id.index = hooks.len();
        hooks.push(hook);
    }

    pub fn hooks(&self, stage: HookStage) -> &[Hook<H>] {
        &self.stages[stage.slot()]
    }

    /// Total number of hooks across every stage.
    pub fn len(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(Vec::is_empty)
    }

    /// Appends copies of `other`'s hooks after this chain's own, stage by
    /// stage.
    pub fn extend_from(&mut self, other: &Self) {
        for stage in HookStage::ALL {
            for hook in other.hooks(stage) {
                self.push(stage, hook.clone());
            }
        }
    }

    /// Runs the hooks of a load stage in registration order, stopping at the
    /// first failure.
    ///
    /// If `cancel` fires while a hook is pending, that hook is dropped and
    /// reported as [`HookError::Cancelled`].
    pub async fn run_load(
        &self,
        stage: HookStage,
        host: &Arc<H>,
        cancel: &CancellationToken,
    ) -> Result<(), (HookId, HookError)> {
        for hook in self.hooks(stage) {
            debug!(hook = %hook.id, "Running hook");
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(HookError::Cancelled),
                res = hook.run(Arc::clone(host)) => res,
            };
            if let Err(e) = outcome {
                return Err((hook.id.clone(), e));
            }
        }
        Ok(())
    }

    /// Runs every hook of an unload stage in reverse registration order and
    /// collects the failures instead of stopping at them.
    pub async fn run_unload(&self, stage: HookStage, host: &Arc<H>) -> Vec<HookFailure> {
        let mut failures = Vec::new();
        for hook in self.hooks(stage).iter().rev() {
            debug!(hook = %hook.id, "Running hook");
            if let Err(error) = hook.run(Arc::clone(host)).await {
                warn!(hook = %hook.id, error = %error, "Unload hook failed");
                failures.push(HookFailure {
                    hook: hook.id.clone(),
                    error,
                });
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use tokio_test::{assert_err, assert_ok};

    use crate::testing::MockHost;

    fn chain() -> HookChain<MockHost> {
        HookChain::new()
    }

    async fn async_no_host() {}

    async fn async_with_host(_host: Arc<MockHost>) -> Result<(), io::Error> {
        Ok(())
    }

    fn sync_no_host() -> Result<(), io::Error> {
        Err(io::Error::other("boom"))
    }

    fn sync_with_host(_host: Arc<MockHost>) {}

    #[test]
    fn test_shape_detection() {
        let h: Hook<MockHost> = async_no_host.into_hook();
        assert!(h.is_async() && !h.wants_host());
        let h: Hook<MockHost> = async_with_host.into_hook();
        assert!(h.is_async() && h.wants_host());
        let h: Hook<MockHost> = sync_no_host.into_hook();
        assert!(!h.is_async() && !h.wants_host());
        let h: Hook<MockHost> = sync_with_host.into_hook();
        assert!(!h.is_async() && h.wants_host());
        assert!(h.id().name.ends_with("sync_with_host"));
    }

    #[tokio::test]
    async fn test_host_argument_is_the_bound_instance() {
        let seen: Arc<Mutex<Option<Arc<MockHost>>>> = Arc::default();
        let seen_clone = Arc::clone(&seen);
        let mut chain = chain();
        chain.push(
            HookStage::PostLoad,
            (move |host: Arc<MockHost>| {
                *seen_clone.lock() = Some(host);
            })
            .into_hook(),
        );

        let host = MockHost::new();
        assert_ok!(
            chain
                .run_load(HookStage::PostLoad, &host, &CancellationToken::new())
                .await
        );
        let received = seen.lock().clone().unwrap();
        assert!(Arc::ptr_eq(&received, &host));
    }

    #[tokio::test]
    async fn test_load_stops_at_first_failure() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (c1, c3) = (Arc::clone(&counter), Arc::clone(&counter));
        let mut chain = chain();
        chain.push(
            HookStage::PostLoad,
            (move || {
                c1.fetch_add(1, Ordering::SeqCst);
            })
            .into_hook(),
        );
        chain.push(HookStage::PostLoad, sync_no_host.into_hook());
        chain.push(
            HookStage::PostLoad,
            (move || {
                let c = Arc::clone(&c3);
                async move {
                    c.fetch_add(10, Ordering::SeqCst);
                }
            })
            .into_hook(),
        );

        let (id, err) = chain
            .run_load(HookStage::PostLoad, &MockHost::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(id.index, 1);
        assert_eq!(id.stage, HookStage::PostLoad);
        assert!(matches!(err, HookError::Failed(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_runs_only_the_requested_stage() {
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::default();
        let mut chain = chain();
        for (stage, label) in [(HookStage::PostLoad, "post"), (HookStage::PreLoad, "pre")] {
            let order = Arc::clone(&order);
            chain.push(stage, (move || order.lock().push(label)).into_hook());
        }

        let host = MockHost::new();
        let token = CancellationToken::new();
        assert_ok!(chain.run_load(HookStage::PreLoad, &host, &token).await);
        assert_eq!(*order.lock(), ["pre"]);
        assert_ok!(chain.run_load(HookStage::PostLoad, &host, &token).await);
        assert_eq!(*order.lock(), ["pre", "post"]);
    }

    #[tokio::test]
    async fn test_cancelled_load_hook() {
        let token = CancellationToken::new();
        let mut chain = chain();
        chain.push(HookStage::PostLoad, (|| future::pending::<()>()).into_hook());

        let cancel = token.clone();
        tokio::spawn(async move { cancel.cancel() });
        let (_, err) = chain
            .run_load(HookStage::PostLoad, &MockHost::new(), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_panicking_load_hook_is_a_failure() {
        let mut chain = chain();
        chain.push(
            HookStage::PreLoad,
            (|| -> Result<(), io::Error> { panic!("bad config") }).into_hook(),
        );

        let (id, err) = chain
            .run_load(HookStage::PreLoad, &MockHost::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(id.stage, HookStage::PreLoad);
        assert!(matches!(err, HookError::Panicked(ref msg) if msg == "bad config"));
    }

    #[tokio::test]
    async fn test_unload_runs_all_in_reverse() {
        let order: Arc<Mutex<Vec<usize>>> = Arc::default();
        let mut chain = chain();
        for i in 0..3 {
            let order = Arc::clone(&order);
            chain.push(
                HookStage::PreUnload,
                (move || -> Result<(), io::Error> {
                    order.lock().push(i);
                    if i == 1 {
                        Err(io::Error::other("second hook broke"))
                    } else {
                        Ok(())
                    }
                })
                .into_hook(),
            );
        }

        let failures = chain.run_unload(HookStage::PreUnload, &MockHost::new()).await;
        assert_eq!(*order.lock(), [2, 1, 0]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].hook.index, 1);
    }

    async fn explode(order: Arc<Mutex<Vec<usize>>>) {
        order.lock().push(2);
        panic!("hook 2 exploded");
    }

    #[tokio::test]
    async fn test_unload_continues_past_a_panicking_hook() {
        let order: Arc<Mutex<Vec<usize>>> = Arc::default();
        let mut chain = chain();
        for i in 1..=3 {
            let order = Arc::clone(&order);
            if i == 2 {
                chain.push(
                    HookStage::PreUnload,
                    (move || explode(Arc::clone(&order))).into_hook(),
                );
            } else {
                chain.push(
                    HookStage::PreUnload,
                    (move || order.lock().push(i)).into_hook(),
                );
            }
        }

        let failures = chain.run_unload(HookStage::PreUnload, &MockHost::new()).await;
        assert_eq!(*order.lock(), [3, 2, 1]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].hook.index, 1);
        assert!(matches!(
            failures[0].error,
            HookError::Panicked(ref msg) if msg == "hook 2 exploded"
        ));
    }

    #[tokio::test]
    async fn test_run_catches_panic_before_the_future_exists() {
        let hook: Hook<MockHost> = (|_host: Arc<MockHost>| -> Result<(), io::Error> {
            panic!("eager")
        })
        .into_hook();
        let err = assert_err!(hook.run(MockHost::new()).await);
        assert!(matches!(err, HookError::Panicked(ref msg) if msg == "eager"));
    }

    #[test]
    fn test_extend_reindexes() {
        let mut a = chain();
        a.push(HookStage::PostLoad, async_no_host.into_hook());
        let mut b = chain();
        b.push(HookStage::PostLoad, sync_with_host.into_hook());
        b.push(HookStage::PreUnload, async_with_host.into_hook());
        b.push(HookStage::PostUnload, async_with_host.into_hook());

        a.extend_from(&b);
        assert_eq!(a.hooks(HookStage::PostLoad).len(), 2);
        assert_eq!(a.hooks(HookStage::PostLoad)[1].id().index, 1);
        assert_eq!(a.hooks(HookStage::PreUnload)[0].id().index, 0);
        assert_eq!(a.hooks(HookStage::PostUnload)[0].id().stage, HookStage::PostUnload);
        assert_eq!(a.len(), 4);
        assert_eq!(b.len(), 3);
    }
}
