use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::Config;

pub mod cache;
pub mod retry;

pub use cache::ResponseCache;
pub use retry::{Fetched, RetryPolicy};

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("upstream returned invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// GET-only JSON client shared by every upstream call.
///
/// Responses are cached by full URL and transport failures are retried
/// before an error is returned.
#[derive(Debug)]
pub struct HttpClient {
    http: Client,
    cache: ResponseCache,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(http: Client, cache: ResponseCache, retry: RetryPolicy) -> Self {
        Self { http, cache, retry }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client")?;

        let expire_after = Duration::from_secs(config.cache.expire_after_secs);
        let cache = match &config.cache.path {
            Some(path) => ResponseCache::persistent(path, expire_after),
            None => ResponseCache::in_memory(expire_after),
        };

        Ok(Self::new(http, cache, RetryPolicy::new(config.retry.retries, config.retry.backoff_factor)))
    }

    pub async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value, HttpError> {
        let key = self.http.get(url).query(query).build()?.url().to_string();

        if let Some(body) = self.cache.get(&key) {
            tracing::debug!(url = %key, "Cache hit");
            return Ok(serde_json::from_str(&body)?);
        }

        tracing::debug!(url = %key, "GET");
        let http = &self.http;
        let Fetched { status, body } = self
            .retry
            .run(|| async move {
                let response = http.get(url).query(query).send().await?;
                let status = response.status();
                let body = response.text().await?;
                Ok(Fetched { status, body })
            })
            .await?;

        if !status.is_success() {
            return Err(HttpError::Status { status, body: truncate_body(&body) });
        }

        let value = serde_json::from_str(&body)?;
        self.cache.insert(key, body).await;
        Ok(value)
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
