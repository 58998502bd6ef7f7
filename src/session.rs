use crate::error::AppError;
use crate::feed::pipeline::run_price_feed;
use crate::feed::types::{
    ConnectionState, FeedConfig, FeedEvent, FeedStatusSnapshot, StartFeedArgs, DEFAULT_BASE_URL,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const EVENT_BUS_CAPACITY: usize = 256;

pub struct PriceFeedHandle {
    pub cancellation_token: CancellationToken,
    pub join_handle: JoinHandle<()>,
}

/// Owns the dashboard runtime for one session lifetime: the feed task, its
/// status snapshot and the display-sink event bus. Dropping or stopping the
/// session tears the feed down; nothing outlives it.
pub struct DashboardSession {
    pub started_at: Instant,
    feed: Mutex<Option<PriceFeedHandle>>,
    feed_status: Arc<RwLock<FeedStatusSnapshot>>,
    events: broadcast::Sender<FeedEvent>,
}

impl DashboardSession {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let feed_status = FeedStatusSnapshot::idle(
            DEFAULT_BASE_URL.to_string(),
            Some("feed idle".to_string()),
        );

        Self {
            started_at: Instant::now(),
            feed: Mutex::new(None),
            feed_status: Arc::new(RwLock::new(feed_status)),
            events,
        }
    }

    /// A new receiver on the display-sink bus. Rendering components subscribe
    /// here; slow subscribers lag rather than back-pressuring the feed.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    /// Starts the price feed, tearing down any previous feed first so the
    /// session never holds more than one transport connection. The handle
    /// slot stays locked across teardown and spawn, so concurrent starts
    /// serialize instead of leaking the loser's feed task.
    pub async fn start_feed(&self, args: StartFeedArgs) -> Result<FeedConfig, AppError> {
        let config = args.normalize()?;

        let mut feed_slot = self.feed.lock().await;
        if let Some(handle) = feed_slot.take() {
            handle.cancellation_token.cancel();
            let _ = handle.join_handle.await;
        }

        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.clone();
        let status_store = Arc::clone(&self.feed_status);
        let task_events = self.events.clone();
        let runtime_config = config.clone();

        let join_handle = tokio::spawn(async move {
            run_price_feed(runtime_config, status_store, task_events, task_token).await;
        });

        *feed_slot = Some(PriceFeedHandle {
            cancellation_token,
            join_handle,
        });

        Ok(config)
    }

    /// Cancels and joins the running feed. Returns whether a feed was running.
    pub async fn stop_feed(&self) -> bool {
        let mut feed_slot = self.feed.lock().await;
        let stopped = if let Some(handle) = feed_slot.take() {
            handle.cancellation_token.cancel();
            let _ = handle.join_handle.await;
            true
        } else {
            false
        };
        drop(feed_slot);

        {
            let current = self.feed_status.read().await.clone();
            let mut writable = self.feed_status.write().await;
            *writable = FeedStatusSnapshot {
                state: ConnectionState::Closed,
                base_url: current.base_url,
                last_price: current.last_price,
                ticks_received: current.ticks_received,
                reason: Some("feed stopped by session".to_string()),
            };
        }

        stopped
    }

    pub async fn status(&self) -> FeedStatusSnapshot {
        self.feed_status.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.feed.lock().await.is_some()
    }
}

impl Default for DashboardSession {
    fn default() -> Self {
        Self::new()
    }
}
