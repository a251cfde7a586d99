//! Bounded retry with exponential backoff for archive requests.
//!
//! Retried: timeouts, connection failures, 5xx, 408 and 429.
//! Everything else is returned to the caller on the first attempt.

use std::{future::Future, time::Duration};

use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 200;
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each following one.
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self { max_retries, initial_delay_ms, max_delay_ms }
    }

    /// No waiting between attempts. Used by tests against local mock servers.
    pub fn immediate(max_retries: u32) -> Self {
        Self::new(max_retries, 0, 0)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

pub fn is_retryable_error(error: &reqwest::Error) -> RetryDecision {
    if error.is_timeout() || error.is_connect() {
        return RetryDecision::Retry;
    }
    if let Some(status) = error.status() {
        return is_retryable_status(status);
    }
    RetryDecision::NoRetry
}

pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        RetryDecision::Retry
    } else {
        RetryDecision::NoRetry
    }
}

/// Run `operation` until it yields a non-retryable outcome or the budget runs out.
///
/// A response with a retryable status on the last attempt is returned as-is so
/// the caller can report the status and body.
pub async fn with_retry<F, Fut>(config: &RetryConfig, operation: F) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt - 1);
            tracing::info!("Retry attempt {} of {}, waiting {:?}", attempt, config.max_retries, delay);
            tokio::time::sleep(delay).await;
        }

        let last_attempt = attempt >= config.max_retries;

        match operation().await {
            Ok(response) => {
                let status = response.status();
                if is_retryable_status(status) == RetryDecision::Retry && !last_attempt {
                    tracing::warn!(
                        "Request returned retryable status {}, attempt {} of {}",
                        status,
                        attempt + 1,
                        config.max_retries + 1
                    );
                } else {
                    if attempt > 0 {
                        tracing::info!("Request finished after {} retries", attempt);
                    }
                    return Ok(response);
                }
            }
            Err(e) => {
                if is_retryable_error(&e) == RetryDecision::NoRetry || last_attempt {
                    if last_attempt {
                        tracing::error!("All {} attempts exhausted", config.max_retries + 1);
                    }
                    return Err(e);
                }
                tracing::warn!(
                    "Retryable error on attempt {} of {}: {}",
                    attempt + 1,
                    config.max_retries + 1,
                    e
                );
            }
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budget() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(200));
    }

    #[test]
    fn delay_doubles() {
        let config = RetryConfig::new(5, 200, 10_000);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(800));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(1600));
    }

    #[test]
    fn delay_is_capped() {
        let config = RetryConfig::new(10, 200, 1000);
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(64), Duration::from_millis(1000));
    }

    #[test]
    fn status_classification() {
        assert_eq!(is_retryable_status(StatusCode::BAD_GATEWAY), RetryDecision::Retry);
        assert_eq!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS), RetryDecision::Retry);
        assert_eq!(is_retryable_status(StatusCode::REQUEST_TIMEOUT), RetryDecision::Retry);
        assert_eq!(is_retryable_status(StatusCode::BAD_REQUEST), RetryDecision::NoRetry);
        assert_eq!(is_retryable_status(StatusCode::NOT_FOUND), RetryDecision::NoRetry);
        assert_eq!(is_retryable_status(StatusCode::OK), RetryDecision::NoRetry);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: RetryConfig = toml::from_str("max_retries = 2").unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.initial_delay_ms, DEFAULT_INITIAL_DELAY_MS);
    }
}
