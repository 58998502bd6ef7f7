use crate::error::AppError;
use crate::feed::types::{NewsItem, PricePoint};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::Deserialize;

const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// The stream emits roughly one tick per second; seeded history points are
/// back-spaced by this period since `/api/history` carries no timestamps.
pub const STREAM_PERIOD_MS: i64 = 1_000;

fn stream_endpoint(base_url: &str) -> String {
    format!("{base_url}/api/stream")
}

fn history_endpoint(base_url: &str) -> String {
    format!("{base_url}/api/history")
}

fn news_endpoint(base_url: &str) -> String {
    format!("{base_url}/api/news")
}

/// Opens the push transport. The caller drives the response body as a byte
/// stream through the SSE decoder.
pub async fn connect_tick_stream(client: &Client, base_url: &str) -> Result<Response, AppError> {
    let response = client
        .get(stream_endpoint(base_url))
        .header(ACCEPT, EVENT_STREAM_CONTENT_TYPE)
        .send()
        .await?
        .error_for_status()?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with(EVENT_STREAM_CONTENT_TYPE) {
        return Err(AppError::Stream(format!(
            "unexpected content type '{content_type}' for event stream"
        )));
    }

    Ok(response)
}

#[derive(Debug, Deserialize)]
struct HistoryWire {
    history: Vec<f64>,
    #[serde(default)]
    current: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct HistorySnapshot {
    pub points: Vec<PricePoint>,
    pub current: Option<f64>,
}

pub async fn fetch_history(
    client: &Client,
    base_url: &str,
    now_ms: i64,
) -> Result<HistorySnapshot, AppError> {
    let response = client
        .get(history_endpoint(base_url))
        .send()
        .await?
        .error_for_status()?;
    let wire = response.json::<HistoryWire>().await?;

    Ok(HistorySnapshot {
        points: price_points_from_history(&wire.history, now_ms),
        current: wire.current,
    })
}

fn price_points_from_history(prices: &[f64], now_ms: i64) -> Vec<PricePoint> {
    let newest_index = prices.len().saturating_sub(1) as i64;
    prices
        .iter()
        .enumerate()
        .map(|(index, &price)| PricePoint {
            timestamp: now_ms - (newest_index - index as i64) * STREAM_PERIOD_MS,
            price,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct NewsWire {
    news: Vec<NewsItem>,
}

pub async fn fetch_news(client: &Client, base_url: &str) -> Result<Vec<NewsItem>, AppError> {
    let response = client
        .get(news_endpoint(base_url))
        .send()
        .await?
        .error_for_status()?;
    let wire = response.json::<NewsWire>().await?;
    Ok(wire.news)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_base_url_without_double_slash() {
        assert_eq!(
            stream_endpoint("http://localhost:8000"),
            "http://localhost:8000/api/stream"
        );
        assert_eq!(
            history_endpoint("http://localhost:8000"),
            "http://localhost:8000/api/history"
        );
        assert_eq!(
            news_endpoint("http://localhost:8000"),
            "http://localhost:8000/api/news"
        );
    }

    #[test]
    fn history_points_are_back_spaced_oldest_first() {
        let points = price_points_from_history(&[10.0, 11.0, 12.0], 5_000);

        assert_eq!(
            points,
            vec![
                PricePoint {
                    timestamp: 3_000,
                    price: 10.0
                },
                PricePoint {
                    timestamp: 4_000,
                    price: 11.0
                },
                PricePoint {
                    timestamp: 5_000,
                    price: 12.0
                },
            ]
        );
    }

    #[test]
    fn empty_history_yields_no_points() {
        assert!(price_points_from_history(&[], 5_000).is_empty());
    }
}
