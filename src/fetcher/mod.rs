//! Page fetchers against the upstream analytics API.
//!
//! The orchestrator talks to the API through the [`EntitySource`] trait, with
//! [`HttpEntitySource`] as the production implementation. The seam exists so
//! retrieval logic can be exercised against scripted in-memory sources.

use crate::{PageResult, RunStats, TimeWindow};
use async_trait::async_trait;

pub mod http;

pub use http::HttpEntitySource;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Non-success, non-retryable API response. Fatal to the current window.
    #[error("API request failed with status {status}: {body}")]
    ApiRequest {
        /// HTTP status code returned by the API
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// Retryable failure class: 429, 5xx, or a network-level fault.
    /// Recovered locally by the retry loop; surfaces only when wrapped in
    /// [`FetchError::RetryBoundExceeded`].
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Repeated transient failures never resolved within the configured
    /// bound. Distinguishes "the server never recovered" from "the server
    /// said no".
    #[error("retry bound exceeded after {attempts} attempts: {last_error}")]
    RetryBoundExceeded {
        /// Total attempts made for the request, including the first
        attempts: u32,
        /// Description of the final transient failure
        last_error: String,
    },

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// The HTTP client could not be constructed
    #[error("client error: {0}")]
    Client(String),
}

/// Result type for fetcher operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Source of entity pages for a time window.
///
/// The trait seam between the orchestrator and the wire protocol.
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Fetch one page of entity records for `window` at `offset`.
    ///
    /// Implementations must increment `stats.api_calls` for every attempt
    /// they make, including retries, and must clamp `limit` to whatever the
    /// upstream API allows.
    ///
    /// # Returns
    /// [`PageResult::Page`] for a non-empty response, or
    /// [`PageResult::EndOfData`] when the window has no further records.
    ///
    /// # Errors
    /// [`FetchError::ApiRequest`] on non-retryable statuses and
    /// [`FetchError::RetryBoundExceeded`] when transient failures persist.
    async fn fetch_page(
        &self,
        window: &TimeWindow,
        offset: u32,
        limit: u32,
        stats: &mut RunStats,
    ) -> FetchResult<PageResult>;
}
