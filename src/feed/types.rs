use crate::error::AppError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_WINDOW_CAPACITY: usize = 50;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;
pub const DEFAULT_NEWS_POLL_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_NEWS_ENABLED: bool = true;
pub const MIN_WINDOW_CAPACITY: usize = 1;
pub const MAX_WINDOW_CAPACITY: usize = 10_000;
pub const MIN_RECONNECT_DELAY_MS: u64 = 10;
pub const MAX_RECONNECT_DELAY_MS: u64 = 60_000;
pub const MIN_NEWS_POLL_INTERVAL_MS: u64 = 1_000;
pub const MAX_NEWS_POLL_INTERVAL_MS: u64 = 600_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// One timestamped price observation retained for charting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct TickWire {
    pub price: f64,
    pub change_percent: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickEvent {
    pub price: f64,
    pub change_percent: f64,
    pub timestamp: i64,
}

impl TickEvent {
    pub fn direction(&self) -> i8 {
        direction_from_change(self.change_percent)
    }

    pub fn point(&self) -> PricePoint {
        PricePoint {
            timestamp: self.timestamp,
            price: self.price,
        }
    }
}

impl TryFrom<TickWire> for TickEvent {
    type Error = AppError;

    fn try_from(value: TickWire) -> Result<Self, Self::Error> {
        if !value.price.is_finite() || !value.change_percent.is_finite() {
            return Err(AppError::InvalidArgument(
                "tick price and change must be finite".to_string(),
            ));
        }

        Ok(Self {
            price: value.price,
            change_percent: value.change_percent,
            timestamp: value.timestamp,
        })
    }
}

pub fn parse_tick_payload(payload: &mut [u8]) -> Result<TickEvent, AppError> {
    let wire: TickWire = simd_json::serde::from_slice(payload)?;
    wire.try_into()
}

/// Non-negative changes count as upward so the sink can render a `+` cue.
pub fn direction_from_change(change_percent: f64) -> i8 {
    if change_percent < 0.0 {
        -1
    } else {
        1
    }
}

/// Signed percentage label for the sink, e.g. `+0.03%` or `-0.05%`. The
/// positive branch formats the magnitude so a negative-zero input still
/// renders as `+0.00%` rather than `+-0.00%`.
pub fn format_change_percent(change_percent: f64) -> String {
    let scaled = change_percent * 100.0;
    if scaled < 0.0 {
        format!("{scaled:.2}%")
    } else {
        format!("+{:.2}%", scaled.abs())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayUpdate {
    pub price: f64,
    pub change_percent: f64,
    pub change_label: String,
    pub direction: i8,
    pub chart: Vec<PricePoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsItem {
    pub category: String,
    pub time: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatusSnapshot {
    pub state: ConnectionState,
    pub base_url: String,
    pub last_price: Option<f64>,
    pub ticks_received: u64,
    pub reason: Option<String>,
}

impl FeedStatusSnapshot {
    pub fn idle(base_url: String, reason: Option<String>) -> Self {
        Self {
            state: ConnectionState::Closed,
            base_url,
            last_price: None,
            ticks_received: 0,
            reason,
        }
    }
}

/// Events published to the display sink over the session's broadcast bus.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum FeedEvent {
    ChartBootstrap(Vec<PricePoint>),
    Tick(DisplayUpdate),
    Status(FeedStatusSnapshot),
    News(Vec<NewsItem>),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartFeedArgs {
    pub base_url: Option<String>,
    pub window_capacity: Option<usize>,
    pub reconnect_delay_ms: Option<u64>,
    pub news_poll_interval_ms: Option<u64>,
    pub news_enabled: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub window_capacity: usize,
    pub reconnect_delay_ms: u64,
    pub news_poll_interval_ms: u64,
    pub news_enabled: bool,
}

impl StartFeedArgs {
    pub fn normalize(self) -> Result<FeedConfig, AppError> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();

        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AppError::InvalidArgument(
                "baseUrl must start with http:// or https://".to_string(),
            ));
        }

        let window_capacity = self.window_capacity.unwrap_or(DEFAULT_WINDOW_CAPACITY);
        if !(MIN_WINDOW_CAPACITY..=MAX_WINDOW_CAPACITY).contains(&window_capacity) {
            return Err(AppError::InvalidArgument(format!(
                "windowCapacity must be between {MIN_WINDOW_CAPACITY} and {MAX_WINDOW_CAPACITY}"
            )));
        }

        let reconnect_delay_ms = self
            .reconnect_delay_ms
            .unwrap_or(DEFAULT_RECONNECT_DELAY_MS);
        if !(MIN_RECONNECT_DELAY_MS..=MAX_RECONNECT_DELAY_MS).contains(&reconnect_delay_ms) {
            return Err(AppError::InvalidArgument(format!(
                "reconnectDelayMs must be between {MIN_RECONNECT_DELAY_MS} and {MAX_RECONNECT_DELAY_MS}"
            )));
        }

        let news_poll_interval_ms = self
            .news_poll_interval_ms
            .unwrap_or(DEFAULT_NEWS_POLL_INTERVAL_MS);
        if !(MIN_NEWS_POLL_INTERVAL_MS..=MAX_NEWS_POLL_INTERVAL_MS)
            .contains(&news_poll_interval_ms)
        {
            return Err(AppError::InvalidArgument(format!(
                "newsPollIntervalMs must be between {MIN_NEWS_POLL_INTERVAL_MS} and {MAX_NEWS_POLL_INTERVAL_MS}"
            )));
        }

        let news_enabled = self.news_enabled.unwrap_or(DEFAULT_NEWS_ENABLED);

        Ok(FeedConfig {
            base_url,
            window_capacity,
            reconnect_delay_ms,
            news_poll_interval_ms,
            news_enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_tick_payload() {
        let mut payload =
            br#"{"price":2351.25,"change_percent":0.0003,"timestamp":1735000000000}"#.to_vec();
        let tick = parse_tick_payload(&mut payload).expect("tick payload should parse");

        assert_eq!(tick.price, 2351.25);
        assert_eq!(tick.change_percent, 0.0003);
        assert_eq!(tick.timestamp, 1_735_000_000_000);
        assert_eq!(tick.direction(), 1);
    }

    #[test]
    fn rejects_malformed_tick_payload() {
        let mut payload = br#"{"price":"broken","change_percent":0.1,"timestamp":1}"#.to_vec();
        assert!(parse_tick_payload(&mut payload).is_err());

        let mut truncated = br#"{"price":2351.25,"change_"#.to_vec();
        assert!(parse_tick_payload(&mut truncated).is_err());
    }

    #[test]
    fn maps_direction_from_change_sign() {
        assert_eq!(direction_from_change(0.01), 1);
        assert_eq!(direction_from_change(0.0), 1);
        assert_eq!(direction_from_change(-0.01), -1);
    }

    #[test]
    fn formats_change_label_with_explicit_sign() {
        assert_eq!(format_change_percent(0.0003), "+0.03%");
        assert_eq!(format_change_percent(0.0), "+0.00%");
        assert_eq!(format_change_percent(-0.0005), "-0.05%");
    }

    #[test]
    fn formats_negative_zero_change_as_positive_zero() {
        assert_eq!(format_change_percent(-0.0), "+0.00%");
        // Sub-resolution negatives keep the minus of their rounded value.
        assert_eq!(format_change_percent(-0.0000001), "-0.00%");
    }

    #[test]
    fn normalizes_start_args_defaults() {
        let config = StartFeedArgs::default()
            .normalize()
            .expect("defaults should be valid");

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.window_capacity, DEFAULT_WINDOW_CAPACITY);
        assert_eq!(config.reconnect_delay_ms, DEFAULT_RECONNECT_DELAY_MS);
        assert_eq!(config.news_poll_interval_ms, DEFAULT_NEWS_POLL_INTERVAL_MS);
        assert!(config.news_enabled);
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let config = StartFeedArgs {
            base_url: Some("http://localhost:8000/".to_string()),
            ..StartFeedArgs::default()
        }
        .normalize()
        .expect("base url should be valid");

        assert_eq!(config.base_url, "http://localhost:8000");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let result = StartFeedArgs {
            base_url: Some("ftp://localhost".to_string()),
            ..StartFeedArgs::default()
        }
        .normalize();

        assert!(result.is_err());
    }

    #[test]
    fn validates_window_capacity_range() {
        let result = StartFeedArgs {
            window_capacity: Some(0),
            ..StartFeedArgs::default()
        }
        .normalize();

        assert!(result.is_err());
    }

    #[test]
    fn validates_reconnect_delay_range() {
        let result = StartFeedArgs {
            reconnect_delay_ms: Some(120_000),
            ..StartFeedArgs::default()
        }
        .normalize();

        assert!(result.is_err());
    }

    #[test]
    fn validates_news_poll_interval_range() {
        let result = StartFeedArgs {
            news_poll_interval_ms: Some(10),
            ..StartFeedArgs::default()
        }
        .normalize();

        assert!(result.is_err());
    }
}
