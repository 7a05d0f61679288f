//! Engine configuration and retry/backoff constants.

use std::time::Duration;

/// Maximum page size enforced by the upstream API. Requested limits are
/// clamped to this value.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Maximum query window accepted by the upstream API: 48 hours.
pub const DEFAULT_MAX_WINDOW_SECS: i64 = 48 * 3_600;

/// Delay applied to a 429 response when no `Retry-After` header is present.
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(1);

/// Fixed delay before retrying a 5xx or network-level failure.
pub const SERVER_FAULT_DELAY: Duration = Duration::from_secs(5);

/// Default bound on consecutive failed retries for one (window, offset)
/// request. 3 retries (4 attempts total) recovers from brief outages while
/// avoiding a livelock on a persistently broken backend.
pub const DEFAULT_RETRY_BOUND: u32 = 3;

/// Politeness pause between successive page fetches within a window, to stay
/// clear of the rate limiter during long paginations.
pub const DEFAULT_PAGE_PAUSE: Duration = Duration::from_millis(200);

/// Policy for handling a fatal fetch error in one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole run. Partial data without the affected window's
    /// counts would misrepresent aggregates, so this is the default.
    #[default]
    AbortRun,
    /// Log the failure and continue with the remaining windows.
    SkipWindow,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::AbortRun),
            "skip" => Ok(FailurePolicy::SkipWindow),
            _ => Err(format!("Invalid failure policy: {s}. Valid options: abort, skip")),
        }
    }
}

/// Configuration surface consumed by the retrieval engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Full URL of the entity endpoint
    pub base_url: String,
    /// Bearer token for the analytics API
    pub token: String,
    /// Maximum window duration in seconds
    pub max_window_secs: i64,
    /// Page size per API call; clamped to [`MAX_PAGE_LIMIT`]
    pub page_limit: u32,
    /// Bound on consecutive failed retries per request
    pub retry_bound: u32,
    /// Exclude entities with missing or non-positive scores
    pub active_only: bool,
    /// What to do when a window fails fatally
    pub failure_policy: FailurePolicy,
    /// Pause between successive page fetches; zero disables
    pub page_pause: Duration,
}

impl EngineConfig {
    /// Create a configuration with defaults matching the upstream API's
    /// documented constraints.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            max_window_secs: DEFAULT_MAX_WINDOW_SECS,
            page_limit: MAX_PAGE_LIMIT,
            retry_bound: DEFAULT_RETRY_BOUND,
            active_only: true,
            failure_policy: FailurePolicy::default(),
            page_pause: DEFAULT_PAGE_PAUSE,
        }
    }

    /// Set the maximum window duration in seconds.
    pub fn with_max_window_secs(mut self, secs: i64) -> Self {
        self.max_window_secs = secs;
        self
    }

    /// Set the page size (clamped to the API maximum at request time).
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    /// Set the retry bound.
    pub fn with_retry_bound(mut self, bound: u32) -> Self {
        self.retry_bound = bound;
        self
    }

    /// Enable or disable the active-entity score filter.
    pub fn with_active_only(mut self, active_only: bool) -> Self {
        self.active_only = active_only;
        self
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the inter-page pause.
    pub fn with_page_pause(mut self, pause: Duration) -> Self {
        self.page_pause = pause;
        self
    }
}
