use std::sync::Arc;
use std::time::Duration;

mod logger;
mod middleware;
mod store;

use async_dispatcher::{Dispatcher, DispatcherConfig, LoggingMiddleware, Outcome};
use middleware::{MaintenanceGuard, StatsMiddleware};
use store::{Fetch, KvStore, Put, Remove};

/// Looked up in the working directory; defaults apply when missing
const CONFIG_FILE: &str = "async-dispatcher.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();

    log::info!("Starting async-dispatcher demo");

    let config = DispatcherConfig::load(CONFIG_FILE);
    let guard = Arc::new(MaintenanceGuard::new());
    let stats = Arc::new(StatsMiddleware::default());

    // Middleware is consulted in this order
    let dispatcher = Dispatcher::builder(KvStore::default())
        .config(config)
        .middleware(LoggingMiddleware::new())
        .middleware(guard.clone()) // Vetoes everything during maintenance
        .middleware(stats.clone()) // Only sees what the guard let through
        .build()?;

    // A burst from several tasks; the slow fetch holds everyone else back
    let mut writers = Vec::new();
    for writer in 0..3 {
        let dispatcher = dispatcher.clone();
        writers.push(tokio::spawn(async move {
            dispatcher.dispatch(Fetch {
                key: format!("profile-{writer}"),
                latency: Duration::from_millis(50),
            });
            dispatcher.dispatch(Put::new(&format!("seen-{writer}"), "true"));
        }));
    }
    for writer in writers {
        writer.await?;
    }
    log::info!("{} action(s) waiting behind the first", dispatcher.pending());

    // Pause, queue some work, drop half of it, resume
    dispatcher.until_idle().await;
    dispatcher.deactivate();
    dispatcher.dispatch(Put::new("draft", "discarded"));
    dispatcher.dispatch(Put::new("draft-2", "discarded"));
    let discarded = dispatcher.clear();
    dispatcher.dispatch(Remove {
        key: "seen-0".to_string(),
    });
    dispatcher.activate();

    // Nothing runs during maintenance
    dispatcher.until_idle().await;
    guard.set_enabled(true);
    let outcome = dispatcher
        .dispatch_with_completion(Put::new("blocked", "yes"))
        .await?;
    guard.set_enabled(false);
    if outcome == Outcome::Vetoed {
        log::info!("Write during maintenance was vetoed");
    }

    dispatcher.until_idle().await;

    let store = dispatcher.consumer();
    for entry in store.journal() {
        log::info!("applied: {}", entry);
    }
    log::info!(
        "{} key(s) stored, {} discarded, {} of {} permitted action(s) executed",
        store.len(),
        discarded,
        stats.executed(),
        stats.asked()
    );
    if let Some(profile) = store.get("profile-1") {
        log::info!("profile-1 = {}", profile);
    }

    log::info!("Exiting async-dispatcher demo");
    Ok(())
}
