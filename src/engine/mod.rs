//! Retrieval run orchestration.
//!
//! Drives the window planner and page fetcher to exhaustively walk every
//! window and page of the requested range, feeding results into the dedup
//! accumulator and reporting terminal statistics.
//!
//! # Overview
//!
//! 1. **Planning**: the requested range is split into API-sized windows
//! 2. **Fetching**: each window is paginated sequentially by offset
//! 3. **Merging**: every page is merged before the next fetch is issued
//! 4. **Completion**: the deduplicated entity set and [`crate::RunStats`]
//!    are returned, for failed and interrupted runs too
//!
//! Windows and pages are processed strictly sequentially. Offset-based
//! pagination against a live dataset is only coherent for a single in-flight
//! request, and the upstream rate limits leave no headroom for parallelism.
//!
//! # Components
//!
//! - [`executor`] - The orchestrator state machine
//! - [`config`] - Configuration surface and retry/backoff constants
//! - [`progress`] - Per-window progress reporting

use crate::{EntityRecord, RunStats};

pub mod config;
pub mod executor;
pub mod progress;

pub use config::{EngineConfig, FailurePolicy};
pub use executor::FetchOrchestrator;
pub use progress::ProgressReporter;

/// Engine errors raised before any network activity. Everything that happens
/// after planning is reported through [`RunOutcome`] instead of an `Err`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The requested range or window bound is invalid
    #[error("planning error: {0}")]
    Plan(#[from] crate::planner::PlanError),
}

/// Terminal state of a retrieval run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// All planned windows were exhausted
    Completed,
    /// A window failed fatally under [`FailurePolicy::AbortRun`]
    Failed,
    /// A caller-level interrupt was honored between windows
    Interrupted,
}

/// Result of one retrieval run: the deduplicated entity set in first-seen
/// order plus run statistics.
///
/// Returned in every terminal state. A failed run carries whatever partial
/// set was accumulated before the failure, never a silent empty success; the
/// error descriptions live in [`RunStats::errors`].
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Deduplicated entity records in first-seen order
    pub records: Vec<EntityRecord>,
    /// Counters and error descriptions for the run
    pub stats: RunStats,
    /// How the run terminated
    pub status: RunStatus,
}

impl RunOutcome {
    /// Whether the run covered every planned window.
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
