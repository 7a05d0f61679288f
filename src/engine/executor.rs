//! The orchestrator state machine for one retrieval run.

use crate::accumulator::EntityAccumulator;
use crate::engine::config::{EngineConfig, FailurePolicy, MAX_PAGE_LIMIT};
use crate::engine::progress::ProgressReporter;
use crate::engine::{EngineError, RunOutcome, RunStatus};
use crate::fetcher::{EntitySource, FetchResult};
use crate::shutdown::{self, SharedShutdown};
use crate::{planner, PageResult, RunStats, TimeWindow};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Drives planner, fetcher, and accumulator through one run.
///
/// State machine: Planning → FetchingWindow ⇄ MergingPage → AdvancingWindow,
/// terminal in Completed, Failed, or Interrupted. Pages are merged before the
/// next fetch is issued, keeping the offset contract with the API stable and
/// the duplicate accounting exact.
pub struct FetchOrchestrator {
    source: Box<dyn EntitySource>,
    config: EngineConfig,
    shutdown: Option<SharedShutdown>,
    progress: ProgressReporter,
}

impl FetchOrchestrator {
    /// Create a new orchestrator over the given source and configuration.
    pub fn new(source: Box<dyn EntitySource>, config: EngineConfig) -> Self {
        Self {
            source,
            config,
            shutdown: shutdown::get_global_shutdown(),
            progress: ProgressReporter::Silent,
        }
    }

    /// Attach a shared shutdown handle. Interrupts are honored between
    /// windows only; a window in flight always finishes or fails first.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Attach a progress reporter ticked once per finished window.
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|s| s.is_shutdown_requested())
    }

    /// Execute one retrieval run over `[start, end)` (epoch seconds).
    ///
    /// # Returns
    /// A [`RunOutcome`] in every terminal state: `Completed` when all windows
    /// were exhausted, `Failed` or `Interrupted` with the best-effort partial
    /// entity set. Statistics are reset at the start of each call.
    ///
    /// # Errors
    /// Only [`EngineError::Plan`] for an invalid range, rejected before any
    /// network call.
    pub async fn run(&self, start: i64, end: i64) -> Result<RunOutcome, EngineError> {
        let windows = planner::plan(start, end, self.config.max_window_secs)?;
        info!(
            start,
            end,
            window_count = windows.len(),
            max_window_secs = self.config.max_window_secs,
            "Planned retrieval windows"
        );

        let limit = self.config.page_limit.clamp(1, MAX_PAGE_LIMIT);
        let mut stats = RunStats::default();
        let mut accumulator = EntityAccumulator::new(self.config.active_only);

        self.progress.begin(windows.len() as u64);

        for (index, window) in windows.iter().enumerate() {
            if self.shutdown_requested() {
                warn!(
                    completed_windows = index,
                    remaining_windows = windows.len() - index,
                    "Interrupt requested, returning partial result"
                );
                self.progress.finish();
                return Ok(RunOutcome {
                    records: accumulator.into_records(),
                    stats,
                    status: RunStatus::Interrupted,
                });
            }

            if let Err(err) = self
                .fetch_window(window, limit, &mut accumulator, &mut stats)
                .await
            {
                stats.errors.push(format!("window {window}: {err}"));
                match self.config.failure_policy {
                    FailurePolicy::AbortRun => {
                        error!(window = %window, error = %err, "Window failed, aborting run");
                        self.progress.finish();
                        return Ok(RunOutcome {
                            records: accumulator.into_records(),
                            stats,
                            status: RunStatus::Failed,
                        });
                    }
                    FailurePolicy::SkipWindow => {
                        warn!(window = %window, error = %err, "Window failed, continuing with remaining windows");
                    }
                }
            }

            self.progress
                .set_message(format!("{} unique users", accumulator.len()));
            self.progress.advance();
        }

        self.progress.finish();
        info!(
            unique_users = accumulator.len(),
            api_calls = stats.api_calls,
            duplicates_skipped = stats.duplicates_skipped,
            errors = stats.error_count(),
            "Retrieval run completed"
        );

        Ok(RunOutcome {
            records: accumulator.into_records(),
            stats,
            status: RunStatus::Completed,
        })
    }

    /// Walk every page of one window, merging each page before requesting
    /// the next.
    ///
    /// The offset advances by `limit` after each accepted page. A page
    /// shorter than the requested limit implies no more data, which saves
    /// the trailing empty-page call; an explicit end-of-data signal covers
    /// windows whose record count is an exact multiple of the limit.
    async fn fetch_window(
        &self,
        window: &TimeWindow,
        limit: u32,
        accumulator: &mut EntityAccumulator,
        stats: &mut RunStats,
    ) -> FetchResult<()> {
        let mut offset = 0u32;
        loop {
            match self.source.fetch_page(window, offset, limit, stats).await? {
                PageResult::EndOfData => {
                    debug!(window = %window, offset, "Window exhausted");
                    return Ok(());
                }
                PageResult::Page(page) => {
                    let received = page.records.len();
                    let outcome = accumulator.merge(page);
                    stats.duplicates_skipped += outcome.duplicates;

                    debug!(
                        window = %window,
                        offset,
                        received,
                        accepted = outcome.accepted,
                        duplicates = outcome.duplicates,
                        "Merged page"
                    );

                    if received < limit as usize {
                        debug!(window = %window, offset, received, "Short page, window exhausted");
                        return Ok(());
                    }

                    offset += limit;
                    if !self.config.page_pause.is_zero() {
                        sleep(self.config.page_pause).await;
                    }
                }
            }
        }
    }
}
