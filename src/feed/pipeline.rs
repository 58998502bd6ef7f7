use crate::feed::api::{connect_tick_stream, fetch_history, fetch_news};
use crate::feed::sse::SseDecoder;
use crate::feed::types::{
    format_change_percent, parse_tick_payload, ConnectionState, DisplayUpdate, FeedConfig,
    FeedEvent, FeedStatusSnapshot, TickEvent,
};
use crate::feed::window::PriceWindow;
use futures_util::StreamExt;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Drives the price feed for one session: seeds the chart window from
/// history, then cycles Connecting -> Open -> Closed with a flat fixed-delay
/// retry until cancelled. The connect/read/sleep cycle lives in this single
/// task, so at most one transport connection and one pending reconnect exist
/// at any time.
pub async fn run_price_feed(
    config: FeedConfig,
    status_store: Arc<RwLock<FeedStatusSnapshot>>,
    events: broadcast::Sender<FeedEvent>,
    cancel_token: CancellationToken,
) {
    let http_client = Client::new();
    let mut window = PriceWindow::new(config.window_capacity);
    let mut ticks_received = 0_u64;
    let mut last_price: Option<f64> = None;

    publish_status(
        &status_store,
        &events,
        ConnectionState::Connecting,
        &config.base_url,
        last_price,
        ticks_received,
        Some("loading price history".to_string()),
    )
    .await;

    match fetch_history(&http_client, &config.base_url, now_unix_ms()).await {
        Ok(snapshot) => {
            window.seed(&snapshot.points);
            last_price = snapshot.current.or_else(|| window.last().map(|point| point.price));
            let _ = events.send(FeedEvent::ChartBootstrap(window.snapshot()));
            info!(points = window.len(), "price history loaded");
        }
        Err(error) => {
            warn!(%error, "price history unavailable, starting with an empty chart");
        }
    }

    let news_handle = if config.news_enabled {
        let news_client = http_client.clone();
        let news_base_url = config.base_url.clone();
        let news_interval_ms = config.news_poll_interval_ms;
        let news_events = events.clone();
        let news_cancel = cancel_token.clone();

        Some(tokio::spawn(async move {
            run_news_ticker(
                news_client,
                news_base_url,
                news_interval_ms,
                news_events,
                news_cancel,
            )
            .await;
        }))
    } else {
        None
    };

    let retry_delay = Duration::from_millis(config.reconnect_delay_ms);
    while !cancel_token.is_cancelled() {
        publish_status(
            &status_store,
            &events,
            ConnectionState::Connecting,
            &config.base_url,
            last_price,
            ticks_received,
            Some("opening event stream".to_string()),
        )
        .await;

        match connect_tick_stream(&http_client, &config.base_url).await {
            Ok(response) => {
                publish_status(
                    &status_store,
                    &events,
                    ConnectionState::Open,
                    &config.base_url,
                    last_price,
                    ticks_received,
                    Some("event stream connected".to_string()),
                )
                .await;

                let mut decoder = SseDecoder::new();
                let mut byte_stream = Box::pin(response.bytes_stream());

                let close_reason = loop {
                    let chunk = tokio::select! {
                        _ = cancel_token.cancelled() => break "feed stopped".to_string(),
                        next_chunk = byte_stream.next() => next_chunk,
                    };

                    match chunk {
                        Some(Ok(bytes)) => {
                            let payloads = match decoder.feed(&bytes) {
                                Ok(payloads) => payloads,
                                Err(error) => {
                                    break format!("event stream framing error: {error}")
                                }
                            };
                            for payload in payloads {
                                if let Some(update) = apply_tick_payload(payload, &mut window) {
                                    ticks_received = ticks_received.saturating_add(1);
                                    last_price = Some(update.price);
                                    let _ = events.send(FeedEvent::Tick(update));
                                }
                            }
                        }
                        Some(Err(error)) => break format!("event stream transport error: {error}"),
                        None => break "event stream closed by server".to_string(),
                    }
                };

                if cancel_token.is_cancelled() {
                    break;
                }

                publish_status(
                    &status_store,
                    &events,
                    ConnectionState::Closed,
                    &config.base_url,
                    last_price,
                    ticks_received,
                    Some(close_reason),
                )
                .await;
            }
            Err(error) => {
                publish_status(
                    &status_store,
                    &events,
                    ConnectionState::Closed,
                    &config.base_url,
                    last_price,
                    ticks_received,
                    Some(format!("event stream connect error: {error}")),
                )
                .await;
            }
        }

        // Flat retry, no backoff growth: every reconnect waits the same delay.
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = tokio::time::sleep(retry_delay) => {}
        }
    }

    cancel_token.cancel();
    if let Some(handle) = news_handle {
        let _ = handle.await;
    }

    publish_status(
        &status_store,
        &events,
        ConnectionState::Closed,
        &config.base_url,
        last_price,
        ticks_received,
        Some("feed stopped".to_string()),
    )
    .await;
}

/// Parses one SSE payload and applies it to the chart window. A malformed
/// payload is discarded with a warning and leaves the window untouched, so a
/// single bad message never tears down an open stream.
fn apply_tick_payload(payload: String, window: &mut PriceWindow) -> Option<DisplayUpdate> {
    let mut bytes = payload.into_bytes();
    let tick = match parse_tick_payload(&mut bytes) {
        Ok(tick) => tick,
        Err(error) => {
            warn!(%error, "discarding malformed tick payload");
            return None;
        }
    };

    window.push(tick.point());
    Some(build_display_update(&tick, window))
}

fn build_display_update(tick: &TickEvent, window: &PriceWindow) -> DisplayUpdate {
    DisplayUpdate {
        price: tick.price,
        change_percent: tick.change_percent,
        change_label: format_change_percent(tick.change_percent),
        direction: tick.direction(),
        chart: window.snapshot(),
    }
}

/// Independent headline poller. The first poll fires immediately, then one
/// request per interval; a failed poll publishes nothing so subscribers keep
/// the previous list.
async fn run_news_ticker(
    client: Client,
    base_url: String,
    poll_interval_ms: u64,
    events: broadcast::Sender<FeedEvent>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(poll_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                match fetch_news(&client, &base_url).await {
                    Ok(items) => {
                        let _ = events.send(FeedEvent::News(items));
                    }
                    Err(error) => {
                        warn!(%error, "news fetch failed, keeping previous headlines");
                    }
                }
            }
        }
    }
}

async fn publish_status(
    status_store: &Arc<RwLock<FeedStatusSnapshot>>,
    events: &broadcast::Sender<FeedEvent>,
    state: ConnectionState,
    base_url: &str,
    last_price: Option<f64>,
    ticks_received: u64,
    reason: Option<String>,
) {
    let snapshot = FeedStatusSnapshot {
        state,
        base_url: base_url.to_string(),
        last_price,
        ticks_received,
        reason,
    };

    info!(
        state = ?snapshot.state,
        reason = snapshot.reason.as_deref().unwrap_or(""),
        "feed status"
    );

    {
        let mut writable = status_store.write().await;
        *writable = snapshot.clone();
    }
    let _ = events.send(FeedEvent::Status(snapshot));
}

fn now_unix_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis().min(i64::MAX as u128) as i64,
        Err(_) => 0,
    }
}
