//! Report rendering for the deduplicated entity set.
//!
//! Consumes the engine's output (ordered entity records plus run statistics)
//! and produces the tabular artifacts: one row per user and a per-group
//! aggregation of experience scores. Presentation only; no retrieval logic
//! lives here.

use crate::EntityRecord;
use serde::Serialize;
use std::collections::BTreeMap;

pub mod csv;

pub use csv::{CsvGroupSummaryWriter, CsvUserReportWriter};

/// Report errors
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Filesystem error
    #[error("IO error: {0}")]
    Io(String),

    /// CSV serialization error
    #[error("CSV error: {0}")]
    Csv(String),
}

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// One row of the per-user report.
#[derive(Debug, Clone, Serialize)]
pub struct UserRow {
    /// User identifier
    pub user_email: String,
    /// Experience score, empty when the upstream omitted it
    pub experience_score: Option<f64>,
    /// Last reported location
    pub location: String,
    /// Number of devices seen
    pub device_count: usize,
    /// Comma-joined device names
    pub device_names: String,
    /// Comma-joined device classifications
    pub device_classifications: String,
    /// Application count as reported upstream
    pub applications_count: u64,
    /// Comma-joined application names
    pub applications: String,
    /// Pipe-joined directory groups
    pub user_groups: String,
    /// Comma-joined private-access hosts
    pub npa_hosts: String,
}

impl From<&EntityRecord> for UserRow {
    fn from(record: &EntityRecord) -> Self {
        Self {
            user_email: record.user.clone(),
            experience_score: record.exp_score,
            location: record.location.clone().unwrap_or_default(),
            device_count: record.devices.len(),
            device_names: record
                .devices
                .iter()
                .map(|d| d.device_name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            device_classifications: record
                .devices
                .iter()
                .map(|d| d.device_classification.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            applications_count: record
                .applications_count
                .unwrap_or(record.applications.len() as u64),
            applications: record.applications.join(", "),
            user_groups: record.user_groups.join(" | "),
            npa_hosts: record.npa_hosts.join(", "),
        }
    }
}

/// Per-group aggregation of experience scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    /// Short group name (last `/` segment of the full path)
    pub group: String,
    /// Number of users counted into this group
    pub user_count: u64,
    /// Mean score across users with a reported score
    pub avg_score: Option<f64>,
    /// Minimum reported score
    pub min_score: Option<f64>,
    /// Maximum reported score
    pub max_score: Option<f64>,
    /// Full group path
    pub group_path: String,
}

/// Shorten a directory group path to its final segment.
fn short_group_name(group: &str) -> &str {
    group.rsplit('/').next().unwrap_or(group)
}

/// Build per-user rows in the engine's first-seen order.
pub fn user_rows(records: &[EntityRecord]) -> Vec<UserRow> {
    records.iter().map(UserRow::from).collect()
}

/// Aggregate records into per-group summaries, sorted by average score
/// descending.
///
/// A user belonging to several groups counts once in each; users without any
/// group fall into `"No Group"`. Score statistics cover only users whose
/// record carries a score, while `user_count` counts every member.
pub fn group_summaries(records: &[EntityRecord]) -> Vec<GroupSummary> {
    #[derive(Default)]
    struct GroupAcc {
        user_count: u64,
        scores: Vec<f64>,
    }

    let mut groups: BTreeMap<String, GroupAcc> = BTreeMap::new();
    for record in records {
        // Upstream group entries can carry stray padding; trim so padded and
        // clean spellings of the same group aggregate together
        let mut memberships: Vec<String> = record
            .user_groups
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect();
        if memberships.is_empty() {
            memberships.push("No Group".to_string());
        }

        for group in memberships {
            let acc = groups.entry(group).or_default();
            acc.user_count += 1;
            if let Some(score) = record.exp_score {
                acc.scores.push(score);
            }
        }
    }

    let mut summaries: Vec<GroupSummary> = groups
        .into_iter()
        .map(|(path, acc)| {
            let avg = if acc.scores.is_empty() {
                None
            } else {
                let mean = acc.scores.iter().sum::<f64>() / acc.scores.len() as f64;
                Some((mean * 100.0).round() / 100.0)
            };
            GroupSummary {
                group: short_group_name(&path).to_string(),
                user_count: acc.user_count,
                avg_score: avg,
                min_score: acc.scores.iter().cloned().reduce(f64::min),
                max_score: acc.scores.iter().cloned().reduce(f64::max),
                group_path: path,
            }
        })
        .collect();

    // Highest-scoring groups first; stable order for ties via full path
    summaries.sort_by(|a, b| {
        b.avg_score
            .partial_cmp(&a.avg_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.group_path.cmp(&b.group_path))
    });

    summaries
}
