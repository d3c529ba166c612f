//! Dispatcher - serializes actions against a single consumer
//!
//! ## Design
//!
//! ```text
//! dispatch(action)
//!     ├─ idle && active → mark busy, spawn drain task starting with action
//!     └─ otherwise      → postpone onto the pipeline
//!
//! drain task: run thunk → pop next (if active) → run thunk → … → mark idle
//! ```
//!
//! All mutable state (pipeline, `is_active`, `is_dispatching`) sits behind one
//! `std::sync::Mutex` that is only taken inside the dispatcher's own methods
//! and is never held across an `.await`. At most one drain task exists per
//! dispatcher: it is spawned only on the idle → busy transition, and it alone
//! performs the busy → idle transition.
//!
//! Queued thunks and the drain task only hold a `Weak` reference to the
//! dispatcher. Once every `Dispatcher` handle is dropped they become no-ops.

use crate::action::{Action, ActionId, ActionMeta, BoxFuture, Outcome};
use crate::config::DispatcherConfig;
use crate::error::{Error, Result};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::pipeline::{Pipeline, Thunk};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};

/// Serializing coordinator for actions against a consumer of type `C`
///
/// Cheap to clone; every clone drives the same pipeline.
pub struct Dispatcher<C> {
    inner: Arc<Inner<C>>,
}

/// Non-owning handle to a dispatcher
///
/// Useful for consumers that need to dispatch follow-up actions to their own
/// dispatcher without keeping it alive.
pub struct WeakDispatcher<C> {
    inner: Weak<Inner<C>>,
}

struct Inner<C> {
    consumer: C,
    middlewares: MiddlewareChain,
    label: Arc<str>,
    queue_warn_threshold: Option<usize>,
    runtime: Handle,
    state: Mutex<State>,
    /// Mirrors `State::is_dispatching` for `until_idle`
    busy: watch::Sender<bool>,
}

struct State {
    pipeline: Pipeline,
    is_active: bool,
    is_dispatching: bool,
    next_id: u64,
}

/// Builder for [`Dispatcher`]; middleware order is fixed once built
pub struct DispatcherBuilder<C> {
    consumer: C,
    config: DispatcherConfig,
    middlewares: MiddlewareChain,
}

impl<C: Send + Sync + 'static> DispatcherBuilder<C> {
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a middleware. Middleware is consulted in registration order.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    /// Build the dispatcher
    ///
    /// Must be called from within a tokio runtime; the dispatcher spawns its
    /// drain task on that runtime.
    pub fn build(self) -> Result<Dispatcher<C>> {
        let runtime =
            Handle::try_current().map_err(|_| Error::NoRuntime(self.config.label.clone()))?;
        let (busy, _) = watch::channel(false);

        log::debug!(
            "Dispatcher '{}' created with {} middleware(s), active: {}",
            self.config.label,
            self.middlewares.len(),
            self.config.start_active
        );

        Ok(Dispatcher {
            inner: Arc::new(Inner {
                consumer: self.consumer,
                middlewares: self.middlewares,
                label: Arc::from(self.config.label),
                queue_warn_threshold: self.config.queue_warn_threshold,
                runtime,
                state: Mutex::new(State {
                    pipeline: Pipeline::new(),
                    is_active: self.config.start_active,
                    is_dispatching: false,
                    next_id: 1,
                }),
                busy,
            }),
        })
    }
}

impl<C: Send + Sync + 'static> Dispatcher<C> {
    pub fn builder(consumer: C) -> DispatcherBuilder<C> {
        DispatcherBuilder {
            consumer,
            config: DispatcherConfig::default(),
            middlewares: MiddlewareChain::default(),
        }
    }

    /// Dispatcher with default config and no middleware
    pub fn new(consumer: C) -> Result<Self> {
        Self::builder(consumer).build()
    }

    /// Dispatch an action
    ///
    /// Runs right away if the dispatcher is active and idle, otherwise the
    /// action waits in the pipeline behind everything dispatched before it.
    /// Never waits for the action itself; use
    /// [`dispatch_with_completion`](Self::dispatch_with_completion) for that.
    pub fn dispatch<A: Action<C>>(&self, action: A) -> ActionId {
        self.submit(Box::new(action), None)
    }

    /// Dispatch an action and get a future resolving once it has finished
    ///
    /// Ordering is identical to [`dispatch`](Self::dispatch). Dropping the
    /// returned [`Completion`] does not cancel the action.
    pub fn dispatch_with_completion<A: Action<C>>(&self, action: A) -> Completion {
        let (tx, rx) = oneshot::channel();
        let id = self.submit(Box::new(action), Some(tx));
        Completion { id, rx }
    }

    /// Run an action now, bypassing the pipeline
    ///
    /// The middleware chain still applies. The busy flag and the pipeline are
    /// left alone, so this may overlap with a queued action that is running
    /// at the same time, and it runs even while the dispatcher is deactivated.
    /// Useful from inside a running action (through a [`WeakDispatcher`] held
    /// by the consumer), where `dispatch` would queue behind the caller.
    pub async fn execute<A: Action<C>>(&self, action: A) -> Outcome {
        let meta = {
            let mut state = self.inner.state();
            self.inner.meta(&mut state, action.name())
        };
        log::debug!("{}: executing {} directly", self.inner.label, meta);
        self.inner.run(&action, &meta).await
    }

    /// Resume draining the pipeline
    pub fn activate(&self) {
        let mut state = self.inner.state();
        if !state.is_active {
            state.is_active = true;
            log::info!(
                "{}: activated with {} pending action(s)",
                self.inner.label,
                state.pipeline.len()
            );
        }

        if state.is_dispatching {
            // The running drain task picks up the backlog itself
            return;
        }
        let Some(first) = state.pipeline.pop_first() else {
            return;
        };
        self.inner.set_dispatching(&mut state, true);
        drop(state);

        self.inner.spawn_drain(first);
    }

    /// Stop taking actions off the pipeline
    ///
    /// An action that is already running finishes normally. Everything
    /// dispatched from now on is queued until [`activate`](Self::activate).
    pub fn deactivate(&self) {
        let mut state = self.inner.state();
        if state.is_active {
            state.is_active = false;
            log::info!("{}: deactivated", self.inner.label);
        }
    }

    /// Drop every pending action without running it
    ///
    /// Returns the number of discarded actions. Callers of plain
    /// [`dispatch`](Self::dispatch) are never told; completions from
    /// [`dispatch_with_completion`](Self::dispatch_with_completion) resolve to
    /// [`Error::Discarded`].
    ///
    /// The discarded actions are dropped after the state lock is released, so
    /// their `Drop` impls may call back into this dispatcher.
    pub fn clear(&self) -> usize {
        let backlog = std::mem::take(&mut self.inner.state().pipeline);
        let discarded = backlog.len();
        drop(backlog);
        if discarded > 0 {
            log::info!(
                "{}: cleared {} pending action(s)",
                self.inner.label,
                discarded
            );
        }
        discarded
    }

    /// Wait until no action is being dispatched
    ///
    /// Returns immediately when idle. Note that a deactivated dispatcher
    /// goes idle with its backlog still queued.
    pub async fn until_idle(&self) {
        let mut busy = self.inner.busy.subscribe();
        let _ = busy.wait_for(|busy| !*busy).await;
    }

    pub fn is_active(&self) -> bool {
        self.inner.state().is_active
    }

    pub fn is_dispatching(&self) -> bool {
        self.inner.state().is_dispatching
    }

    /// Number of actions waiting in the pipeline
    pub fn pending(&self) -> usize {
        self.inner.state().pipeline.len()
    }

    pub fn consumer(&self) -> &C {
        &self.inner.consumer
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn downgrade(&self) -> WeakDispatcher<C> {
        WeakDispatcher {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn submit(
        &self,
        action: Box<dyn Action<C>>,
        done: Option<oneshot::Sender<Outcome>>,
    ) -> ActionId {
        let mut state = self.inner.state();
        let meta = self.inner.meta(&mut state, action.name());
        let id = meta.id;
        let thunk = Inner::thunk(Arc::downgrade(&self.inner), action, meta, done);

        if state.is_active && !state.is_dispatching {
            self.inner.set_dispatching(&mut state, true);
            drop(state);

            log::debug!("{}: running action {} immediately", self.inner.label, id);
            self.inner.spawn_drain(thunk);
        } else {
            state.pipeline.postpone(thunk);
            let pending = state.pipeline.len();
            let is_active = state.is_active;
            drop(state);

            log::debug!(
                "{}: postponed action {} ({} pending, active: {})",
                self.inner.label,
                id,
                pending,
                is_active
            );
            if backlog_crossed(self.inner.queue_warn_threshold, pending) {
                log::warn!(
                    "{}: pipeline backlog grew past {} action(s)",
                    self.inner.label,
                    pending - 1
                );
            }
        }

        id
    }
}

/// True only for the postpone that takes the backlog past `threshold`
fn backlog_crossed(threshold: Option<usize>, pending: usize) -> bool {
    threshold.is_some_and(|threshold| pending == threshold + 1)
}

impl<C: Send + Sync + 'static> Inner<C> {
    fn state(&self) -> MutexGuard<'_, State> {
        // State is only mutated by code that cannot panic mid-update
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn meta(&self, state: &mut State, name: &'static str) -> ActionMeta {
        let id = ActionId(state.next_id);
        state.next_id += 1;
        ActionMeta {
            id,
            name,
            dispatcher: Arc::clone(&self.label),
        }
    }

    fn set_dispatching(&self, state: &mut State, value: bool) {
        state.is_dispatching = value;
        self.busy.send_replace(value);
    }

    /// Middleware permission chain, then the action bracketed by its hooks
    async fn run(&self, action: &dyn Action<C>, meta: &ActionMeta) -> Outcome {
        if !self.middlewares.permits(meta).await {
            return Outcome::Vetoed;
        }

        self.middlewares.will_execute(meta).await;
        action.execute(&self.consumer).await;
        self.middlewares.did_execute(meta).await;
        Outcome::Executed
    }

    fn thunk(
        inner: Weak<Self>,
        action: Box<dyn Action<C>>,
        meta: ActionMeta,
        done: Option<oneshot::Sender<Outcome>>,
    ) -> Thunk {
        Box::new(move || -> BoxFuture<'static, ()> {
            Box::pin(async move {
                let Some(inner) = inner.upgrade() else {
                    log::trace!("{} skipped, dispatcher is gone", meta);
                    return;
                };
                let outcome = inner.run(action.as_ref(), &meta).await;
                if let Some(done) = done {
                    let _ = done.send(outcome);
                }
            })
        })
    }

    fn spawn_drain(self: &Arc<Self>, first: Thunk) {
        self.runtime.spawn(Self::drain(Arc::downgrade(self), first));
    }

    /// Run `first`, then keep popping until the pipeline is empty or paused
    ///
    /// Each thunk is awaited to completion before the next one is popped.
    async fn drain(inner: Weak<Self>, first: Thunk) {
        let mut next = first;
        loop {
            next().await;

            let Some(inner) = inner.upgrade() else {
                return;
            };
            match inner.next_step() {
                Some(thunk) => next = thunk,
                None => return,
            }
        }
    }

    /// Pop the next thunk, or go idle if there is none or we are paused
    fn next_step(&self) -> Option<Thunk> {
        let mut state = self.state();
        if !state.is_active {
            log::debug!(
                "{}: paused with {} pending action(s)",
                self.label,
                state.pipeline.len()
            );
            self.set_dispatching(&mut state, false);
            return None;
        }

        match state.pipeline.pop_first() {
            Some(thunk) => {
                log::trace!(
                    "{}: draining, {} left behind this one",
                    self.label,
                    state.pipeline.len()
                );
                Some(thunk)
            }
            None => {
                log::trace!("{}: pipeline drained", self.label);
                self.set_dispatching(&mut state, false);
                None
            }
        }
    }
}

impl<C> Drop for Inner<C> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !state.pipeline.is_empty() {
            log::debug!(
                "{}: dropped with {} pending action(s)",
                self.label,
                state.pipeline.len()
            );
        }
    }
}

impl<C> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Dispatcher")
            .field("label", &self.inner.label)
            .field("is_active", &state.is_active)
            .field("is_dispatching", &state.is_dispatching)
            .field("pending", &state.pipeline.len())
            .finish()
    }
}

impl<C> WeakDispatcher<C> {
    pub fn upgrade(&self) -> Option<Dispatcher<C>> {
        self.inner.upgrade().map(|inner| Dispatcher { inner })
    }
}

impl<C> Clone for WeakDispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

/// Resolves once a dispatched action has run (or was vetoed)
///
/// Resolves to [`Error::Discarded`] if the action was cleared from the
/// pipeline, or its dispatcher dropped, before it ran.
#[derive(Debug)]
pub struct Completion {
    id: ActionId,
    rx: oneshot::Receiver<Outcome>,
}

impl Completion {
    pub fn id(&self) -> ActionId {
        self.id
    }
}

impl Future for Completion {
    type Output = Result<Outcome>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let id = this.id;
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|received| received.map_err(|_| Error::Discarded(id)))
    }
}
