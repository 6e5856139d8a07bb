pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod repository;
pub mod services;

use std::sync::Arc;
use tokio::task::JoinHandle;

use config::Config;
use handlers::AppState;
use repository::ContentStore;
use services::{
    ContentService, CounterService, FanoutDispatcher, FeedService, MediaStore,
    NotificationService, RegexTextExtractor,
};

/// Wired service graph plus the fan-out worker that must be drained on shutdown.
pub struct ServiceBundle {
    pub state: AppState,
    pub fanout: Arc<FanoutDispatcher>,
    pub fanout_worker: Option<JoinHandle<()>>,
}

impl ServiceBundle {
    /// Stops queueing fan-out work and waits for the worker to drain.
    pub async fn shutdown(self) {
        self.fanout.close();
        if let Some(worker) = self.fanout_worker {
            if let Err(err) = worker.await {
                tracing::error!(error = %err, "Fan-out worker terminated abnormally");
            }
        }
    }
}

/// Builds every service over `store` and `media`. Spawns the fan-out worker
/// unless inline fan-out is configured, so it must run inside a Tokio runtime.
pub fn build_services(
    config: &Config,
    store: Arc<dyn ContentStore>,
    media: Arc<dyn MediaStore>,
) -> ServiceBundle {
    let notifications = NotificationService::new(store.clone());

    let (fanout, fanout_worker) = if config.fanout.inline {
        (FanoutDispatcher::inline(notifications.clone()), None)
    } else {
        let (dispatcher, worker) =
            FanoutDispatcher::spawn(notifications.clone(), config.fanout.queue_capacity);
        (dispatcher, Some(worker))
    };
    let fanout = Arc::new(fanout);

    let counters = CounterService::new(
        store.clone(),
        notifications.clone(),
        config.counters.clone(),
    );
    let content = ContentService::new(
        store.clone(),
        media.clone(),
        Arc::new(RegexTextExtractor),
        notifications.clone(),
        fanout.clone(),
        config.content.clone(),
    );
    let feed = FeedService::new(store.clone(), config.feed.clone());

    ServiceBundle {
        state: AppState::new(store, media, counters, content, feed, notifications),
        fanout,
        fanout_worker,
    }
}
