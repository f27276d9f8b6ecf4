use reqwest::header::HeaderMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

/// Reddit's view of our request budget, taken from the `x-ratelimit-*`
/// headers of the most recent response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSnapshot {
    pub remaining: f64,
    pub used: u32,
    pub resets_in: Duration,
}

pub fn parse_rate_limit_headers(headers: &HeaderMap) -> Option<RateLimitSnapshot> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
    };

    let remaining = header("x-ratelimit-remaining")?.parse::<f64>().ok()?;
    let resets_in = header("x-ratelimit-reset")?.parse::<f64>().ok()?;
    let used = header("x-ratelimit-used")
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(0);

    Some(RateLimitSnapshot {
        remaining,
        used,
        resets_in: Duration::from_secs_f64(resets_in.max(0.0)),
    })
}

#[derive(Debug, Default)]
struct RateLimitWindow {
    remaining: Option<f64>,
    used: u32,
    reset_at: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitStatus {
    pub remaining: Option<f64>,
    pub used: u32,
    pub resets_in: Option<Duration>,
}

/// Holds requests back once Reddit reports the budget for the current window
/// is spent. Requests are sequential, so this only ever delays, never queues.
#[derive(Debug, Default)]
pub struct RateLimiter {
    window: Mutex<RateLimitWindow>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_headers(&self, headers: &HeaderMap) {
        if let Some(snapshot) = parse_rate_limit_headers(headers) {
            let mut window = self.window.lock().await;
            window.remaining = Some(snapshot.remaining);
            window.used = snapshot.used;
            window.reset_at = Some(Instant::now() + snapshot.resets_in);
        }
    }

    pub async fn delay_before_next_request(&self) -> Option<Duration> {
        let window = self.window.lock().await;
        match (window.remaining, window.reset_at) {
            (Some(remaining), Some(reset_at)) if remaining < 1.0 => {
                let wait = reset_at.saturating_duration_since(Instant::now());
                (!wait.is_zero()).then_some(wait)
            }
            _ => None,
        }
    }

    pub async fn acquire_permit(&self) {
        if let Some(wait) = self.delay_before_next_request().await {
            debug!("Rate limit budget spent, waiting {:?}", wait);
            sleep(wait).await;
        }
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        let window = self.window.lock().await;
        RateLimitStatus {
            remaining: window.remaining,
            used: window.used,
            resets_in: window
                .reset_at
                .map(|reset_at| reset_at.saturating_duration_since(Instant::now())),
        }
    }
}
