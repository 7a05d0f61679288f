//! HTTP implementation of [`EntitySource`] for the analytics API.
//!
//! Wire contract:
//! - POST to the configured endpoint with a bearer token and JSON body
//!   `{starttime, endtime, limit, offset}` (epoch seconds)
//! - Response body `{users: [...], totalUsersCount: n}`; an empty `users`
//!   list signals exhaustion of the window
//! - 429 responses carry an optional `Retry-After` header (seconds)
//!
//! Retry policy: 429, 5xx, and network-level failures are retried against
//! the *same* (window, offset) pair without advancing, up to the configured
//! bound of consecutive failures. Every attempt, including retries, counts
//! toward the run's API-call total.

use crate::engine::config::{
    EngineConfig, DEFAULT_RATE_LIMIT_DELAY, MAX_PAGE_LIMIT, SERVER_FAULT_DELAY,
};
use crate::fetcher::{EntitySource, FetchError, FetchResult};
use crate::{EntityPage, EntityRecord, PageResult, RunStats, TimeWindow};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Request timeout for a single page fetch
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON request body for one page query
#[derive(Debug, Serialize)]
struct PageQuery {
    starttime: i64,
    endtime: i64,
    limit: u32,
    offset: u32,
}

/// JSON response body for one page query
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UsersResponse {
    users: Vec<EntityRecord>,
    total_users_count: u64,
}

/// Outcome of a single request attempt, before retry classification
enum AttemptFailure {
    /// Not retryable; propagate as-is
    Fatal(FetchError),
    /// Retryable after `delay`
    Transient { reason: String, delay: Duration },
}

/// Production [`EntitySource`] backed by `reqwest`.
pub struct HttpEntitySource {
    client: Client,
    endpoint: String,
    token: String,
    retry_bound: u32,
    rate_limit_fallback: Duration,
    server_fault_delay: Duration,
}

impl HttpEntitySource {
    /// Create a new HTTP source from the engine configuration.
    ///
    /// # Errors
    /// Returns [`FetchError::Client`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: &EngineConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.base_url.clone(),
            token: config.token.clone(),
            retry_bound: config.retry_bound,
            rate_limit_fallback: DEFAULT_RATE_LIMIT_DELAY,
            server_fault_delay: SERVER_FAULT_DELAY,
        })
    }

    /// Override the delay applied when a 429 response carries no
    /// `Retry-After` header.
    pub fn with_rate_limit_fallback(mut self, delay: Duration) -> Self {
        self.rate_limit_fallback = delay;
        self
    }

    /// Override the fixed delay applied before retrying a 5xx or
    /// network-level failure.
    pub fn with_server_fault_delay(mut self, delay: Duration) -> Self {
        self.server_fault_delay = delay;
        self
    }

    /// Extract the `Retry-After` value (in seconds) from a 429 response.
    ///
    /// Returns `None` when the header is absent or not a valid integer, in
    /// which case the configured fallback delay applies.
    fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
        let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
        match value.trim().parse::<u64>() {
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(e) => {
                warn!("Failed to parse Retry-After header '{}': {}", value, e);
                None
            }
        }
    }

    /// Execute a single request attempt and classify the outcome.
    async fn attempt(&self, query: &PageQuery) -> Result<PageResult, AttemptFailure> {
        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(query)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                // Timeouts and connection resets share the transient class
                return Err(AttemptFailure::Transient {
                    reason: format!("network error: {e}"),
                    delay: self.server_fault_delay,
                });
            }
        };

        let status = response.status();

        if status.as_u16() == 429 {
            let delay =
                Self::parse_retry_after(response.headers()).unwrap_or(self.rate_limit_fallback);
            return Err(AttemptFailure::Transient {
                reason: format!("rate limited (429), retrying after {}s", delay.as_secs()),
                delay,
            });
        }

        if status.is_server_error() {
            return Err(AttemptFailure::Transient {
                reason: format!("server fault: {status}"),
                delay: self.server_fault_delay,
            });
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AttemptFailure::Fatal(FetchError::ApiRequest {
                status: status.as_u16(),
                body,
            }));
        }

        let parsed: UsersResponse = response.json().await.map_err(|e| {
            AttemptFailure::Fatal(FetchError::Parse(format!(
                "failed to deserialize response: {e}"
            )))
        })?;

        if parsed.users.is_empty() {
            debug!("Empty user list received, window exhausted");
            return Ok(PageResult::EndOfData);
        }

        Ok(PageResult::Page(EntityPage {
            records: parsed.users,
            total_count_hint: parsed.total_users_count,
            offset: query.offset,
        }))
    }
}

#[async_trait]
impl EntitySource for HttpEntitySource {
    async fn fetch_page(
        &self,
        window: &TimeWindow,
        offset: u32,
        limit: u32,
        stats: &mut RunStats,
    ) -> FetchResult<PageResult> {
        let query = PageQuery {
            starttime: window.start,
            endtime: window.end,
            limit: limit.min(MAX_PAGE_LIMIT),
            offset,
        };

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            stats.api_calls += 1;

            debug!(
                window = %window,
                offset,
                attempt = attempts,
                "Fetching entity page"
            );

            match self.attempt(&query).await {
                Ok(result) => return Ok(result),
                Err(AttemptFailure::Fatal(err)) => return Err(err),
                Err(AttemptFailure::Transient { reason, delay }) => {
                    warn!(
                        window = %window,
                        offset,
                        attempt = attempts,
                        max_attempts = self.retry_bound + 1,
                        "{reason}"
                    );

                    if attempts > self.retry_bound {
                        return Err(FetchError::RetryBoundExceeded {
                            attempts,
                            last_error: reason,
                        });
                    }

                    // Same (window, offset) pair is retried; offset never advances here
                    sleep(delay).await;
                }
            }
        }
    }
}
