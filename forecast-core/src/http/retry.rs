//! Retry with exponential backoff for upstream GET requests.
//!
//! Retried: timeouts, connection failures, requests or body reads cut off
//! midway, 5xx, 408 and 429.
//! Everything else (other 4xx, malformed requests) surfaces immediately.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

pub const DEFAULT_RETRIES: u32 = 5;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 0.2;
const MAX_BACKOFF: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

/// A response read to the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Seconds; the n-th retry waits `backoff_factor * 2^(n-1)`.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retries: DEFAULT_RETRIES, backoff_factor: DEFAULT_BACKOFF_FACTOR }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff_factor: f64) -> Self {
        Self { retries, backoff_factor }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 || self.backoff_factor.is_nan() || self.backoff_factor <= 0.0 {
            return Duration::ZERO;
        }
        let secs = self.backoff_factor * 2f64.powi(retry as i32 - 1);
        Duration::try_from_secs_f64(secs).map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }

    /// Run `operation` until it yields a non-retryable outcome or the budget is spent.
    ///
    /// A retryable status on the last attempt is returned as-is so the caller
    /// can report it.
    pub async fn run<F, Fut>(&self, mut operation: F) -> Result<Fetched, reqwest::Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Fetched, reqwest::Error>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(fetched) => {
                    let status = fetched.status;
                    if is_retryable_status(status) == RetryDecision::NoRetry {
                        if attempt > 0 {
                            tracing::info!("Request succeeded after {} retries", attempt);
                        }
                        return Ok(fetched);
                    }
                    if attempt >= self.retries {
                        tracing::error!(%status, "All {} retry attempts exhausted", self.retries);
                        return Ok(fetched);
                    }
                    tracing::warn!(%status, "Retryable status on attempt {} of {}", attempt + 1, self.retries + 1);
                }
                Err(e) => {
                    if is_retryable_error(&e) == RetryDecision::NoRetry {
                        tracing::debug!("Non-retryable error: {}", e);
                        return Err(e);
                    }
                    if attempt >= self.retries {
                        tracing::error!("All {} retry attempts exhausted: {}", self.retries, e);
                        return Err(e);
                    }
                    tracing::warn!("Retryable error on attempt {} of {}: {}", attempt + 1, self.retries + 1, e);
                }
            }

            attempt += 1;
            tokio::time::sleep(self.delay_for_retry(attempt)).await;
        }
    }
}

pub fn is_retryable_error(error: &reqwest::Error) -> RetryDecision {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        return RetryDecision::Retry;
    }
    // Response bodies are read as text and parsed separately, so a body or
    // decode error here is a connection cut off mid-read.
    if error.is_body() || error.is_decode() {
        return RetryDecision::Retry;
    }
    match error.status() {
        Some(status) => is_retryable_status(status),
        None => RetryDecision::NoRetry,
    }
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
