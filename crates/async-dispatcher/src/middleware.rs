//! Middleware - gate and observe every action a dispatcher runs
//!
//! ## Design
//!
//! ```text
//! should_execute (in order, stops at first refusal)
//!     → will_execute (all, in order)
//!     → Action::execute
//!     → did_execute (all, in order)
//! ```
//!
//! A refusal is a veto: the action is consumed without running, and no
//! `will_execute`/`did_execute` hook fires for it. Middleware registered after
//! the refusing one is not asked at all.
//!
//! Middleware is registered once when the dispatcher is built and is shared
//! by reference from then on, so hooks take `&self`. Keep any bookkeeping
//! behind a `Mutex` or atomics.
//!
//! ## Example
//!
//! ```rust
//! use async_dispatcher::{ActionMeta, BoxFuture, Middleware};
//!
//! struct ReadOnlyMode;
//!
//! impl Middleware for ReadOnlyMode {
//!     fn should_execute<'a>(&'a self, action: &'a ActionMeta) -> BoxFuture<'a, bool> {
//!         Box::pin(async move { !action.name.starts_with("Write") })
//!     }
//! }
//! ```

use crate::action::{ActionMeta, BoxFuture};
use std::sync::Arc;

/// Middleware trait - consulted around every action's execution
///
/// Every hook has a default: permit the action, do nothing before or after.
/// Hooks may suspend; the dispatcher awaits each one before moving on.
pub trait Middleware: Send + Sync {
    /// Decide whether the action may run
    ///
    /// # Returns
    /// - `true`: ask the next middleware, then run the action
    /// - `false`: veto the action
    fn should_execute<'a>(&'a self, _action: &'a ActionMeta) -> BoxFuture<'a, bool> {
        Box::pin(async { true })
    }

    /// Called right before a permitted action runs
    fn will_execute<'a>(&'a self, _action: &'a ActionMeta) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }

    /// Called once a permitted action has finished
    fn did_execute<'a>(&'a self, _action: &'a ActionMeta) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}

/// Lets callers keep a handle on middleware they registered
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn should_execute<'a>(&'a self, action: &'a ActionMeta) -> BoxFuture<'a, bool> {
        (**self).should_execute(action)
    }

    fn will_execute<'a>(&'a self, action: &'a ActionMeta) -> BoxFuture<'a, ()> {
        (**self).will_execute(action)
    }

    fn did_execute<'a>(&'a self, action: &'a ActionMeta) -> BoxFuture<'a, ()> {
        (**self).did_execute(action)
    }
}

/// Ordered middleware list, fixed once the dispatcher is built
#[derive(Default)]
pub(crate) struct MiddlewareChain {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl MiddlewareChain {
    pub(crate) fn push(&mut self, middleware: Box<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub(crate) fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Ask each middleware in registration order, stopping at the first veto
    pub(crate) async fn permits(&self, action: &ActionMeta) -> bool {
        for (index, middleware) in self.middlewares.iter().enumerate() {
            if !middleware.should_execute(action).await {
                log::debug!("{} vetoed by middleware {}", action, index);
                return false;
            }
        }
        true
    }

    pub(crate) async fn will_execute(&self, action: &ActionMeta) {
        for middleware in &self.middlewares {
            middleware.will_execute(action).await;
        }
    }

    pub(crate) async fn did_execute(&self, action: &ActionMeta) {
        for middleware in &self.middlewares {
            middleware.did_execute(action).await;
        }
    }
}

/// LoggingMiddleware - logs every action passing through the dispatcher
///
/// Never vetoes anything.
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for LoggingMiddleware {
    fn should_execute<'a>(&'a self, action: &'a ActionMeta) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            log::debug!("Action requested: {}", action);
            true
        })
    }

    fn will_execute<'a>(&'a self, action: &'a ActionMeta) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            log::debug!("Action starting: {}", action);
        })
    }

    fn did_execute<'a>(&'a self, action: &'a ActionMeta) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            log::debug!("Action finished: {}", action);
        })
    }
}
