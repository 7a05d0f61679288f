//! Report command implementation

use crate::engine::{EngineConfig, FailurePolicy, FetchOrchestrator, ProgressReporter, RunStatus};
use crate::fetcher::HttpEntitySource;
use crate::report::csv::write_report;
use crate::shutdown::SharedShutdown;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use super::CliError;

/// Try to parse a datetime from RFC3339 format.
///
/// Handles inputs with and without timezone designators:
/// - "2024-01-01T00:00:00Z" - explicit UTC
/// - "2024-01-01T00:00:00+01:00" - explicit offset
/// - "2024-01-01T00:00:00" - no timezone, assumed UTC
///
/// Returns epoch seconds, or None if parsing fails.
fn try_parse_datetime_rfc3339(input: &str) -> Option<i64> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{input}Z")) {
        return Some(dt.timestamp());
    }

    None
}

/// Parse a start time from YYYY-MM-DD or RFC3339 datetime format.
///
/// For date-only format, uses start-of-day (00:00:00 UTC).
fn parse_start_time_flexible(input: &str) -> Result<i64, CliError> {
    if let Some(ts) = try_parse_datetime_rfc3339(input) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("Invalid start time: {e}")))?;
    let datetime = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CliError::InvalidArgument("Invalid start time".to_string()))?;
    Ok(datetime.and_utc().timestamp())
}

/// Parse an end time from YYYY-MM-DD or RFC3339 datetime format.
///
/// For date-only format, uses end-of-day (23:59:59 UTC) so the specified
/// date is fully included.
fn parse_end_time_flexible(input: &str) -> Result<i64, CliError> {
    if let Some(ts) = try_parse_datetime_rfc3339(input) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("Invalid end time: {e}")))?;
    let datetime = date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| CliError::InvalidArgument("Invalid end time".to_string()))?;
    Ok(datetime.and_utc().timestamp())
}

/// Parse a lookback expression such as "24h", "1d", "7d", or "30d" into
/// seconds.
fn parse_lookback(input: &str) -> Result<i64, String> {
    let input = input.trim();
    let (value, secs_per_unit) = if let Some(value) = input.strip_suffix('h') {
        (value, 3_600_i64)
    } else if let Some(value) = input.strip_suffix('d') {
        (value, 86_400_i64)
    } else {
        return Err(format!("Invalid lookback unit in {input}. Use h or d"));
    };
    let value: i64 = value
        .parse()
        .map_err(|_| format!("Invalid lookback: {input}. Use forms like 24h, 1d, 7d, 30d"))?;
    if value <= 0 {
        return Err(format!("Lookback must be positive, got {input}"));
    }
    value
        .checked_mul(secs_per_unit)
        .ok_or_else(|| format!("Lookback out of range: {input}"))
}

/// Top-level CLI definition
#[derive(Debug, Parser)]
#[command(
    name = "telemetry-report",
    version,
    about = "Retrieve user-activity telemetry and emit deduplicated CSV reports"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Retrieve user telemetry over a date range and write CSV reports
    Report(ReportArgs),
}

/// Arguments for the `report` subcommand
#[derive(Debug, Parser)]
pub struct ReportArgs {
    /// Full URL of the entity endpoint
    #[arg(long, env = "TELEMETRY_API_URL")]
    pub api_url: String,

    /// Bearer token for the analytics API
    #[arg(long, env = "TELEMETRY_API_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Range start (YYYY-MM-DD or RFC3339); requires --end
    #[arg(long, conflicts_with = "last", requires = "end")]
    pub start: Option<String>,

    /// Range end (YYYY-MM-DD or RFC3339); requires --start
    #[arg(long, conflicts_with = "last", requires = "start")]
    pub end: Option<String>,

    /// Lookback from now instead of an explicit range (e.g. 24h, 7d, 30d)
    #[arg(long, value_parser = parse_lookback)]
    pub last: Option<i64>,

    /// Directory for the CSV artifacts
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Maximum query window in hours accepted by the API
    #[arg(long, default_value_t = 48)]
    pub max_window_hours: i64,

    /// Page size per API call (clamped to the API maximum of 100)
    #[arg(long, default_value_t = 100)]
    pub page_limit: u32,

    /// Consecutive failed retries allowed per request
    #[arg(long, default_value_t = 3)]
    pub retry_bound: u32,

    /// Include entities with missing or non-positive scores
    #[arg(long)]
    pub include_inactive: bool,

    /// Behavior when a window fails fatally: abort or skip
    #[arg(long, default_value = "abort")]
    pub on_error: FailurePolicy,

    /// Pause between successive page fetches, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub page_pause_ms: u64,

    /// Suppress the progress bar
    #[arg(long)]
    pub quiet: bool,
}

impl ReportArgs {
    /// Resolve the requested `[start, end)` range in epoch seconds.
    fn resolve_range(&self) -> Result<(i64, i64), CliError> {
        if let Some(lookback_secs) = self.last {
            let end = Utc::now().timestamp();
            return Ok((end - lookback_secs, end));
        }

        match (&self.start, &self.end) {
            (Some(start), Some(end)) => Ok((
                parse_start_time_flexible(start)?,
                parse_end_time_flexible(end)?,
            )),
            _ => Err(CliError::InvalidArgument(
                "Provide either --last or both --start and --end".to_string(),
            )),
        }
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(&self.api_url, &self.token)
            .with_max_window_secs(self.max_window_hours * 3_600)
            .with_page_limit(self.page_limit)
            .with_retry_bound(self.retry_bound)
            .with_active_only(!self.include_inactive)
            .with_failure_policy(self.on_error)
            .with_page_pause(Duration::from_millis(self.page_pause_ms))
    }

    /// Execute the report command.
    ///
    /// Runs the retrieval engine, writes both CSV artifacts (for partial
    /// results too), and fails with [`CliError::RunFailed`] when the run
    /// terminated in the failed state.
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<(), CliError> {
        let (start, end) = self.resolve_range()?;
        let config = self.engine_config();
        let source = HttpEntitySource::new(&config)?;

        let progress = if self.quiet {
            ProgressReporter::Silent
        } else {
            ProgressReporter::bar()
        };

        let orchestrator = FetchOrchestrator::new(Box::new(source), config)
            .with_shutdown(shutdown)
            .with_progress(progress);

        let outcome = orchestrator.run(start, end).await?;

        for error in &outcome.stats.errors {
            warn!("Encountered during run: {error}");
        }

        // Partial results are written too; data is never silently discarded
        let timestamp = Utc::now().format("%Y%m%d_%H%M");
        let users_path = self.output_dir.join(format!("users_{timestamp}.csv"));
        let groups_path = self
            .output_dir
            .join(format!("group_summary_{timestamp}.csv"));
        let (user_rows, group_rows) = write_report(&outcome.records, &users_path, &groups_path)?;

        info!(
            unique_users = outcome.records.len(),
            api_calls = outcome.stats.api_calls,
            duplicates_skipped = outcome.stats.duplicates_skipped,
            errors = outcome.stats.error_count(),
            user_rows,
            group_rows,
            users_path = %users_path.display(),
            groups_path = %groups_path.display(),
            "Report written"
        );

        match outcome.status {
            RunStatus::Completed => Ok(()),
            RunStatus::Interrupted => {
                warn!("Run interrupted; report covers the windows completed before the interrupt");
                Ok(())
            }
            RunStatus::Failed => Err(CliError::RunFailed(format!(
                "{} error(s); partial report written to {}",
                outcome.stats.error_count(),
                users_path.display()
            ))),
        }
    }
}
