use flairbot_core::{CoreError, RedditApiError, RetrySettings};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Retry config tuned for the Reddit API
    pub fn reddit() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }

    /// Reddit defaults with the overrides from the `[retry]` settings section.
    pub fn from_settings(settings: &RetrySettings) -> Self {
        let mut config = Self::reddit();
        if let Some(max_attempts) = settings.max_attempts {
            config.max_attempts = max_attempts.max(1);
        }
        if let Some(base_delay_ms) = settings.base_delay_ms {
            config.base_delay_ms = base_delay_ms;
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry after the delay Reddit asked for
    RetryWithDelay(Duration),
    /// Permanent failure
    NoRetry,
}

pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    match error {
        CoreError::RedditApi(reddit_error) => match reddit_error {
            RedditApiError::RateLimitExceeded { retry_after } => {
                RetryStrategy::RetryWithDelay(Duration::from_secs(*retry_after))
            }
            RedditApiError::ServerError { .. } => RetryStrategy::Retry,
            RedditApiError::RequestTimeout => RetryStrategy::Retry,
            RedditApiError::InvalidResponse { .. } => RetryStrategy::Retry,
            RedditApiError::AuthenticationFailed { .. } => RetryStrategy::NoRetry,
            RedditApiError::InvalidToken => RetryStrategy::NoRetry,
            RedditApiError::Forbidden { .. } => RetryStrategy::NoRetry,
            RedditApiError::NotFound { .. } => RetryStrategy::NoRetry,
            // Reddit answered and said no; asking again changes nothing
            RedditApiError::FlairRejected { .. } => RetryStrategy::NoRetry,
        },
        CoreError::Network(reqwest_error) => {
            if reqwest_error.is_timeout() || reqwest_error.is_connect() {
                RetryStrategy::Retry
            } else {
                RetryStrategy::NoRetry
            }
        }
        _ => RetryStrategy::NoRetry,
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let max_delay = Duration::from_millis(config.max_delay_ms);

    let exponential_delay = if attempt == 0 {
        Duration::from_millis(config.base_delay_ms)
    } else {
        let multiplier = config.backoff_multiplier.powi(attempt as i32);
        let delay_ms = (config.base_delay_ms as f64 * multiplier) as u64;
        Duration::from_millis(delay_ms.min(config.max_delay_ms))
    };

    let jitter_range = (exponential_delay.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);

    (exponential_delay + Duration::from_millis(jitter)).min(max_delay)
}

/// Wraps remote operations with retry logic
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Runs `operation` until it succeeds, fails permanently or runs out of
    /// attempts. The last error is returned unchanged.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut total_delay_ms = 0u64;
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            "Operation {} succeeded after {} retries (total delay: {}ms)",
                            operation_name, attempt, total_delay_ms
                        );
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            debug!(
                "Attempt {} failed for {}: {}",
                attempt + 1,
                operation_name,
                error
            );

            let has_attempts_left = attempt + 1 < max_attempts;
            let delay = match get_retry_strategy(&error) {
                RetryStrategy::Retry if has_attempts_left => calculate_delay(attempt, &self.config),
                RetryStrategy::RetryWithDelay(delay) if has_attempts_left => {
                    delay.min(Duration::from_millis(self.config.max_delay_ms))
                }
                _ => {
                    error!(
                        "Operation {} failed with total retry delay of {}ms: {}",
                        operation_name, total_delay_ms, error
                    );
                    return Err(error);
                }
            };

            total_delay_ms += delay.as_millis() as u64;
            info!("Retrying {} in {:?}", operation_name, delay);
            sleep(delay).await;
            attempt += 1;
        }
    }
}
