//! Demo middleware

use async_dispatcher::{ActionMeta, BoxFuture, Middleware};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Vetoes every action, reads included, while maintenance mode is on
pub struct MaintenanceGuard {
    enabled: AtomicBool,
}

impl MaintenanceGuard {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        log::info!("Maintenance mode {}", if enabled { "on" } else { "off" });
    }
}

impl Default for MaintenanceGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for MaintenanceGuard {
    fn should_execute<'a>(&'a self, action: &'a ActionMeta) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            if self.enabled.load(Ordering::SeqCst) {
                log::warn!("Rejected {} during maintenance", action);
                return false;
            }
            true
        })
    }
}

/// Counts executed actions
///
/// Registered after the guard, so vetoed actions never reach it.
#[derive(Default)]
pub struct StatsMiddleware {
    asked: AtomicUsize,
    executed: AtomicUsize,
}

impl StatsMiddleware {
    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

impl Middleware for StatsMiddleware {
    fn should_execute<'a>(&'a self, _action: &'a ActionMeta) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            self.asked.fetch_add(1, Ordering::SeqCst);
            true
        })
    }

    fn did_execute<'a>(&'a self, _action: &'a ActionMeta) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.executed.fetch_add(1, Ordering::SeqCst);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Fetch, KvStore, Put};
    use std::time::Duration;
    use async_dispatcher::{Dispatcher, Outcome};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_guard_vetoes_before_stats() {
        let guard = Arc::new(MaintenanceGuard::new());
        let stats = Arc::new(StatsMiddleware::default());
        let dispatcher = Dispatcher::builder(KvStore::default())
            .middleware(guard.clone())
            .middleware(stats.clone())
            .build()
            .unwrap();

        guard.set_enabled(true);
        let outcome = dispatcher
            .dispatch_with_completion(Put::new("k", "v"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Vetoed);
        assert_eq!(stats.asked(), 0);

        guard.set_enabled(false);
        let outcome = dispatcher
            .dispatch_with_completion(Put::new("k", "v"))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Executed);
        assert_eq!(stats.asked(), 1);
        assert_eq!(stats.executed(), 1);
        assert_eq!(dispatcher.consumer().get("k").as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_guard_vetoes_reads_too() {
        let guard = Arc::new(MaintenanceGuard::default());
        let dispatcher = Dispatcher::builder(KvStore::default())
            .middleware(guard.clone())
            .build()
            .unwrap();

        guard.set_enabled(true);
        let outcome = dispatcher
            .dispatch_with_completion(Fetch {
                key: "profile".to_string(),
                latency: Duration::from_millis(1),
            })
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Vetoed);
        assert_eq!(dispatcher.consumer().get("profile"), None);
    }
}
