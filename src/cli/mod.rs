//! CLI command implementations

pub mod error;
pub mod report;

pub use error::CliError;
pub use report::{Cli, Commands, ReportArgs};
