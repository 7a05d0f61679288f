//! CLI error types and conversions

use crate::engine::EngineError;
use crate::fetcher::FetchError;
use crate::report::ReportError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Engine error
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    Fetch(#[from] FetchError),

    /// Report error
    #[error("report error: {0}")]
    Report(#[from] ReportError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The retrieval run terminated in the failed state
    #[error("run failed: {0}")]
    RunFailed(String),
}
