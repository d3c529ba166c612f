//! Actions - named units of work bound to one consumer type
//!
//! An action carries its own payload and knows how to apply itself to the
//! consumer that owns the dispatcher. The pairing is checked by the compiler:
//! an `Action<Store>` can only ever be dispatched on a `Dispatcher<Store>`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// BoxFuture type alias for async actions and middleware hooks
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit of work executed against a consumer of type `C`
///
/// `execute` may suspend for as long as it needs (timers, I/O, waiting on
/// another task). The dispatcher does not look at the outcome: any failure
/// has to be recorded on the consumer by the action itself.
///
/// The dispatcher waits for `execute` to finish before starting the next
/// queued action, so an action that never completes stalls its pipeline.
///
/// # Example
///
/// ```rust
/// use async_dispatcher::{Action, BoxFuture};
/// use std::sync::Mutex;
///
/// struct Counter {
///     value: Mutex<i64>,
/// }
///
/// struct Increment(i64);
///
/// impl Action<Counter> for Increment {
///     fn name(&self) -> &'static str {
///         "Increment"
///     }
///
///     fn execute<'a>(&'a self, counter: &'a Counter) -> BoxFuture<'a, ()> {
///         Box::pin(async move {
///             *counter.value.lock().unwrap() += self.0;
///         })
///     }
/// }
/// ```
pub trait Action<C>: Send + Sync + 'static {
    /// Stable tag middleware can use to tell actions apart
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Apply the action to the consumer
    fn execute<'a>(&'a self, consumer: &'a C) -> BoxFuture<'a, ()>;
}

/// Identity of a single dispatched action, unique per dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionId(pub u64);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What middleware gets to see of an action
///
/// Middleware is shared by every consumer/action pairing, so it receives this
/// type-erased description instead of the action itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionMeta {
    pub id: ActionId,
    pub name: &'static str,
    /// Label of the dispatcher the action was submitted to
    pub dispatcher: Arc<str>,
}

impl fmt::Display for ActionMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} on {}", self.name, self.id, self.dispatcher)
    }
}

/// Result of running an action through the middleware chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Permitted and executed, post hooks included
    Executed,
    /// Refused by a middleware; the action never ran
    Vetoed,
}
