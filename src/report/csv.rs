//! CSV writers for the per-user report and the group summary.

use super::{GroupSummary, ReportError, ReportResult, UserRow};
use csv::Writer;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_BUFFER_SIZE: usize = 8192;

fn create_writer<P: AsRef<Path>>(path: P) -> ReportResult<Writer<BufWriter<File>>> {
    let path = path.as_ref();
    info!("Creating CSV report: path={}", path.display());

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ReportError::Io(format!("Failed to create directory: {e}")))?;
    }

    let file =
        File::create(path).map_err(|e| ReportError::Io(format!("Failed to create file: {e}")))?;

    Ok(Writer::from_writer(BufWriter::with_capacity(
        DEFAULT_BUFFER_SIZE,
        file,
    )))
}

/// CSV writer for per-user report rows.
pub struct CsvUserReportWriter {
    writer: Writer<BufWriter<File>>,
    rows_written: u64,
}

impl CsvUserReportWriter {
    /// Create a writer at `path`, creating parent directories as needed.
    pub fn new<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        Ok(Self {
            writer: create_writer(path)?,
            rows_written: 0,
        })
    }

    /// Write a single row. Headers are emitted on the first call.
    pub fn write_row(&mut self, row: &UserRow) -> ReportResult<()> {
        self.writer
            .serialize(row)
            .map_err(|e| ReportError::Csv(format!("Failed to write user row: {e}")))?;
        self.rows_written += 1;
        Ok(())
    }

    /// Number of rows written so far.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush and close the writer.
    pub fn close(mut self) -> ReportResult<u64> {
        self.writer
            .flush()
            .map_err(|e| ReportError::Io(format!("Failed to flush: {e}")))?;
        debug!("User report closed: {} rows", self.rows_written);
        Ok(self.rows_written)
    }
}

/// CSV writer for group summaries.
pub struct CsvGroupSummaryWriter {
    writer: Writer<BufWriter<File>>,
    rows_written: u64,
}

impl CsvGroupSummaryWriter {
    /// Create a writer at `path`, creating parent directories as needed.
    pub fn new<P: AsRef<Path>>(path: P) -> ReportResult<Self> {
        Ok(Self {
            writer: create_writer(path)?,
            rows_written: 0,
        })
    }

    /// Write a single group summary. Headers are emitted on the first call.
    pub fn write_summary(&mut self, summary: &GroupSummary) -> ReportResult<()> {
        self.writer
            .serialize(summary)
            .map_err(|e| ReportError::Csv(format!("Failed to write group summary: {e}")))?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flush and close the writer.
    pub fn close(mut self) -> ReportResult<u64> {
        self.writer
            .flush()
            .map_err(|e| ReportError::Io(format!("Failed to flush: {e}")))?;
        debug!("Group summary closed: {} rows", self.rows_written);
        Ok(self.rows_written)
    }
}

/// Write both report artifacts for a finished run.
///
/// # Returns
/// `(user_rows, group_rows)` counts actually written.
pub fn write_report<P: AsRef<Path>>(
    records: &[crate::EntityRecord],
    users_path: P,
    groups_path: P,
) -> ReportResult<(u64, u64)> {
    let mut users = CsvUserReportWriter::new(users_path)?;
    for row in super::user_rows(records) {
        users.write_row(&row)?;
    }
    let user_count = users.close()?;

    let mut groups = CsvGroupSummaryWriter::new(groups_path)?;
    for summary in super::group_summaries(records) {
        groups.write_summary(&summary)?;
    }
    let group_count = groups.close()?;

    Ok((user_count, group_count))
}
