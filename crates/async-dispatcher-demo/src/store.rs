//! In-memory key/value store driven through the dispatcher

use async_dispatcher::{Action, BoxFuture};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct KvStore {
    entries: Mutex<BTreeMap<String, String>>,
    /// Writes the store has applied, oldest first
    journal: Mutex<Vec<String>>,
}

impl KvStore {
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal
            .lock()
            .map(|journal| journal.clone())
            .unwrap_or_default()
    }

    fn record(&self, entry: String) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(entry);
        }
    }
}

/// Set a key
pub struct Put {
    pub key: String,
    pub value: String,
}

impl Put {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl Action<KvStore> for Put {
    fn name(&self) -> &'static str {
        "Put"
    }

    fn execute<'a>(&'a self, store: &'a KvStore) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Ok(mut entries) = store.entries.lock() {
                entries.insert(self.key.clone(), self.value.clone());
            }
            store.record(format!("put {}={}", self.key, self.value));
        })
    }
}

/// Remove a key
pub struct Remove {
    pub key: String,
}

impl Action<KvStore> for Remove {
    fn name(&self) -> &'static str {
        "Remove"
    }

    fn execute<'a>(&'a self, store: &'a KvStore) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Ok(mut entries) = store.entries.lock() {
                entries.remove(&self.key);
            }
            store.record(format!("remove {}", self.key));
        })
    }
}

/// Pretend to fetch a value from a slow remote, then store it
pub struct Fetch {
    pub key: String,
    pub latency: Duration,
}

impl Action<KvStore> for Fetch {
    fn name(&self) -> &'static str {
        "Fetch"
    }

    fn execute<'a>(&'a self, store: &'a KvStore) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            tokio::time::sleep(self.latency).await;
            let value = format!("remote-{}", self.key);
            if let Ok(mut entries) = store.entries.lock() {
                entries.insert(self.key.clone(), value.clone());
            }
            store.record(format!("fetch {}={}", self.key, value));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_dispatcher::Dispatcher;

    #[tokio::test]
    async fn test_fetch_then_put_applies_in_order() {
        let dispatcher = Dispatcher::new(KvStore::default()).unwrap();

        dispatcher.dispatch(Fetch {
            key: "user".to_string(),
            latency: Duration::from_millis(20),
        });
        dispatcher.dispatch(Put::new("user", "local"));
        dispatcher.until_idle().await;

        let store = dispatcher.consumer();
        assert_eq!(store.get("user").as_deref(), Some("local"));
        assert_eq!(
            store.journal(),
            vec!["fetch user=remote-user", "put user=local"]
        );
    }

    #[tokio::test]
    async fn test_remove() {
        let dispatcher = Dispatcher::new(KvStore::default()).unwrap();

        dispatcher.dispatch(Put::new("a", "1"));
        dispatcher
            .dispatch_with_completion(Remove {
                key: "a".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(dispatcher.consumer().get("a"), None);
        assert_eq!(dispatcher.consumer().len(), 0);
    }
}
