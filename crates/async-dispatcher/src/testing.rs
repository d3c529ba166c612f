//! Test fixtures: a small consumer, two actions and a recording middleware

use crate::action::{Action, ActionId, ActionMeta, BoxFuture};
use crate::dispatcher::Dispatcher;
use crate::middleware::Middleware;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Consumer used by the tests. Clones share state, so a test can keep one
/// around after handing the other to a dispatcher.
#[derive(Clone)]
pub struct TestStore {
    value: Arc<Mutex<String>>,
    history: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl TestStore {
    pub fn new() -> Self {
        Self {
            value: Arc::new(Mutex::new("initial".to_string())),
            history: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn value(&self) -> String {
        self.value.lock().unwrap().clone()
    }

    /// Every value assigned so far, oldest first
    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap().clone()
    }

    /// Highest number of actions ever observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn assign(&self, value: &str) {
        *self.value.lock().unwrap() = value.to_string();
        self.history.lock().unwrap().push(value.to_string());
    }
}

/// Assigns the value immediately
pub struct SetValue(pub String);

impl SetValue {
    pub fn new(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Action<TestStore> for SetValue {
    fn name(&self) -> &'static str {
        "SetValue"
    }

    fn execute<'a>(&'a self, store: &'a TestStore) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            store.enter();
            store.assign(&self.0);
            store.leave();
        })
    }
}

/// Assigns the value after a delay
pub struct DelayedSetValue {
    pub value: String,
    pub delay: Duration,
}

impl DelayedSetValue {
    pub fn new(value: &str, delay_ms: u64) -> Self {
        Self {
            value: value.to_string(),
            delay: Duration::from_millis(delay_ms),
        }
    }
}

impl Action<TestStore> for DelayedSetValue {
    fn name(&self) -> &'static str {
        "DelayedSetValue"
    }

    fn execute<'a>(&'a self, store: &'a TestStore) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            store.enter();
            tokio::time::sleep(self.delay).await;
            store.assign(&self.value);
            store.leave();
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    ShouldExecute,
    WillExecute,
    DidExecute,
}

/// Hook calls across several middlewares: (middleware name, hook, action)
pub type Journal = Arc<Mutex<Vec<(&'static str, Hook, ActionId)>>>;

/// Middleware that can be told to veto and remembers what it saw
pub struct RecordingMiddleware {
    name: &'static str,
    should_execute: AtomicBool,
    hook_delay: Option<Duration>,
    last_asked: Mutex<Option<ActionMeta>>,
    last_executed: Mutex<Option<ActionMeta>>,
    journal: Journal,
}

impl RecordingMiddleware {
    pub fn journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn new(name: &'static str) -> Self {
        Self::with_journal(name, &Self::journal())
    }

    pub fn with_journal(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            should_execute: AtomicBool::new(true),
            hook_delay: None,
            last_asked: Mutex::new(None),
            last_executed: Mutex::new(None),
            journal: Arc::clone(journal),
        }
    }

    /// Make every hook sleep before returning
    pub fn with_hook_delay(mut self, delay: Duration) -> Self {
        self.hook_delay = Some(delay);
        self
    }

    pub fn set_should_execute(&self, value: bool) {
        self.should_execute.store(value, Ordering::SeqCst);
    }

    pub fn last_asked(&self) -> Option<ActionMeta> {
        self.last_asked.lock().unwrap().clone()
    }

    pub fn last_executed(&self) -> Option<ActionMeta> {
        self.last_executed.lock().unwrap().clone()
    }

    async fn record(&self, hook: Hook, action: &ActionMeta) {
        if let Some(delay) = self.hook_delay {
            tokio::time::sleep(delay).await;
        }
        self.journal
            .lock()
            .unwrap()
            .push((self.name, hook, action.id));
    }
}

impl Middleware for RecordingMiddleware {
    fn should_execute<'a>(&'a self, action: &'a ActionMeta) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            *self.last_asked.lock().unwrap() = Some(action.clone());
            self.record(Hook::ShouldExecute, action).await;
            self.should_execute.load(Ordering::SeqCst)
        })
    }

    fn will_execute<'a>(&'a self, action: &'a ActionMeta) -> BoxFuture<'a, ()> {
        Box::pin(self.record(Hook::WillExecute, action))
    }

    fn did_execute<'a>(&'a self, action: &'a ActionMeta) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            *self.last_executed.lock().unwrap() = Some(action.clone());
            self.record(Hook::DidExecute, action).await;
        })
    }
}

/// Poll until the dispatcher is no longer dispatching
///
/// Panics if that does not happen within `timeout`.
pub async fn wait_until_idle<C: Send + Sync + 'static>(
    dispatcher: &Dispatcher<C>,
    timeout: Duration,
) {
    let started = Instant::now();
    while dispatcher.is_dispatching() {
        assert!(
            started.elapsed() < timeout,
            "dispatcher still busy after {:?}",
            timeout
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
