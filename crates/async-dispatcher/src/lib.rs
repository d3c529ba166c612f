//! # async-dispatcher
//!
//! Ordered, serialized execution of async actions against a single consumer.
//!
//! A [`Dispatcher`] owns a consumer (typically the state of some larger
//! component) and guarantees that actions dispatched to it run one at a time,
//! in submission order, even when many tasks dispatch concurrently. Every
//! action passes through a [`Middleware`] chain that can veto it and observe
//! it before and after it runs.
//!
//! ```rust
//! use async_dispatcher::{Action, BoxFuture, Dispatcher, LoggingMiddleware};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Store {
//!     title: Mutex<String>,
//! }
//!
//! struct SetTitle(String);
//!
//! impl Action<Store> for SetTitle {
//!     fn execute<'a>(&'a self, store: &'a Store) -> BoxFuture<'a, ()> {
//!         Box::pin(async move {
//!             *store.title.lock().unwrap() = self.0.clone();
//!         })
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> async_dispatcher::Result<()> {
//! let dispatcher = Dispatcher::builder(Store::default())
//!     .middleware(LoggingMiddleware::new())
//!     .build()?;
//!
//! dispatcher.dispatch(SetTitle("draft".into()));
//! dispatcher.dispatch_with_completion(SetTitle("final".into())).await?;
//! assert_eq!(*dispatcher.consumer().title.lock().unwrap(), "final");
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod middleware;
pub mod pipeline;

#[cfg(test)]
mod testing;

pub use action::{Action, ActionId, ActionMeta, BoxFuture, Outcome};
pub use config::DispatcherConfig;
pub use dispatcher::{Completion, Dispatcher, DispatcherBuilder, WeakDispatcher};
pub use error::{Error, Result};
pub use middleware::{LoggingMiddleware, Middleware};
pub use pipeline::{Pipeline, Thunk};
