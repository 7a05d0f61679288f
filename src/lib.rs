//! # Telemetry Report Library
//!
//! A library for retrieving user-activity telemetry from a paginated,
//! rate-limited HTTP analytics API over an arbitrary time span, deduplicating
//! the records, and emitting tabular reports.
//!
//! ## Features
//!
//! - **Window Planning**: Splits any date range into sub-windows that respect
//!   the API's maximum query duration
//! - **Bounded Pagination**: Offset-based page walking with a short-page
//!   heuristic that avoids wasted trailing calls
//! - **Rate-Limit Handling**: Honors `Retry-After` on 429 responses and
//!   retries transient server faults up to a configurable bound
//! - **Exact Deduplication**: First-seen-wins merging keyed by normalized
//!   user identifier, with precise duplicate accounting
//! - **Best-Effort Results**: Failed or interrupted runs still surface the
//!   partial entity set and run statistics
//!
//! ## Quick Start
//!
//! ```no_run
//! use telemetry_report::engine::{EngineConfig, FetchOrchestrator};
//! use telemetry_report::fetcher::HttpEntitySource;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::new("https://tenant.example.com/api/v2/users/getentities", "token");
//! let source = HttpEntitySource::new(&config)?;
//!
//! let orchestrator = FetchOrchestrator::new(Box::new(source), config);
//! let outcome = orchestrator.run(1704067200, 1704672000).await?;
//!
//! println!("{} unique users, {} API calls", outcome.records.len(), outcome.stats.api_calls);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`planner`] - Pure time-window planning over the requested range
//! - [`fetcher`] - Page fetching with retry/backoff against the upstream API
//! - [`accumulator`] - First-seen-wins deduplication across pages and windows
//! - [`engine`] - Orchestration of the full retrieval run
//! - [`report`] - Per-user and per-group tabular report rendering (CSV)

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

/// First-seen-wins deduplication across pages and windows
pub mod accumulator;

/// CLI command implementations
pub mod cli;

/// Retrieval run orchestration
pub mod engine;

/// Page fetchers against the upstream analytics API
pub mod fetcher;

/// Time-window planning
pub mod planner;

/// Report rendering (per-user rows, group summaries, CSV output)
pub mod report;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// A bounded sub-range of the overall time span, sized to respect the API's
/// maximum query duration.
///
/// Timestamps are Unix epoch seconds. Invariant: `start < end` and
/// `end - start` never exceeds the configured maximum window duration.
/// Windows are immutable once produced by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive window start (epoch seconds)
    pub start: i64,
    /// Exclusive window end (epoch seconds)
    pub end: i64,
}

impl TimeWindow {
    /// Window duration in seconds.
    pub fn duration_secs(&self) -> i64 {
        self.end - self.start
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A device associated with a user record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    /// Device hostname as reported by the upstream API
    pub device_name: String,
    /// Managed/unmanaged classification
    pub device_classification: String,
}

/// One user's raw telemetry attributes as returned by the analytics API.
///
/// Field names follow the upstream wire format (camelCase). Collections
/// default to empty and the score to `None` when absent, since the upstream
/// schema is not validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityRecord {
    /// User identifier (typically an email address)
    pub user: String,
    /// Experience score; `None` or non-positive marks an inactive entity
    pub exp_score: Option<f64>,
    /// Last reported location
    pub location: Option<String>,
    /// Devices seen for this user
    pub devices: Vec<Device>,
    /// Application names seen for this user
    pub applications: Vec<String>,
    /// Application count as reported upstream
    pub applications_count: Option<u64>,
    /// Directory groups the user belongs to
    pub user_groups: Vec<String>,
    /// Private-access hosts reached by this user
    pub npa_hosts: Vec<String>,
}

impl EntityRecord {
    /// Normalized identity key used for deduplication: the trimmed,
    /// case-folded user identifier. Empty when the record carries no
    /// usable identifier.
    pub fn identity_key(&self) -> String {
        self.user.trim().to_lowercase()
    }

    /// Whether this record counts as an active entity (positive score).
    pub fn is_active(&self) -> bool {
        self.exp_score.is_some_and(|s| s > 0.0)
    }
}

/// One bounded-size batch of records returned by a single API call within a
/// window. Transient: exists only for the duration of one fetch/merge cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityPage {
    /// Records in upstream order
    pub records: Vec<EntityRecord>,
    /// Total-count hint reported by the API for the queried window
    pub total_count_hint: u64,
    /// Offset this page was fetched at
    pub offset: u32,
}

/// Result of a single page fetch: either a non-empty page or a definitive
/// end-of-data signal for the current window.
#[derive(Debug, Clone, PartialEq)]
pub enum PageResult {
    /// A page with at least one record
    Page(EntityPage),
    /// The window has no further pages (upstream returned an empty list)
    EndOfData,
}

/// Counters for one retrieval run.
///
/// Threaded explicitly through the orchestrator and returned at completion
/// rather than kept as process-wide state, so the engine stays safely
/// re-invokable. Reset at the start of each run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Total API calls made, including every retry attempt
    pub api_calls: u64,
    /// Records discarded because their identity key was already accumulated
    pub duplicates_skipped: u64,
    /// Human-readable descriptions of every error encountered
    pub errors: Vec<String>,
}

impl RunStats {
    /// Number of errors encountered during the run.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}
