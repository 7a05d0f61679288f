//! First-seen-wins deduplication of entity records across pages and windows.
//!
//! Overlapping windows and repeated pages can re-surface the same entity with
//! stale attribute snapshots. The accumulator keeps exactly one record per
//! identity key, retaining the earliest-encountered snapshot and counting
//! every later occurrence as a duplicate. This is deliberate policy: the
//! first window processed wins, later duplicates are dropped, not merged.

use crate::{EntityPage, EntityRecord};
use std::collections::HashSet;
use tracing::debug;

/// Result of merging one page into the accumulated set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Records newly inserted into the accumulated set
    pub accepted: u64,
    /// Records discarded because their identity key was already present
    pub duplicates: u64,
}

/// Accumulates deduplicated entity records for the lifetime of one run.
///
/// Insertion order equals first-seen order, so the final record sequence is
/// stable across retries of identical input. When `active_only` is set,
/// records with a missing or non-positive score are excluded entirely,
/// counting as neither accepted nor duplicate. Records without a usable
/// identity key are likewise skipped.
#[derive(Debug, Default)]
pub struct EntityAccumulator {
    seen: HashSet<String>,
    records: Vec<EntityRecord>,
    active_only: bool,
}

impl EntityAccumulator {
    /// Create an empty accumulator.
    ///
    /// # Arguments
    /// * `active_only` - Exclude entities with missing or non-positive scores
    pub fn new(active_only: bool) -> Self {
        Self {
            seen: HashSet::new(),
            records: Vec::new(),
            active_only,
        }
    }

    /// Merge one page into the accumulated set.
    ///
    /// Idempotent with respect to duplicates: merging the same page twice
    /// accepts zero records the second time and counts every record of the
    /// page as a duplicate instead.
    pub fn merge(&mut self, page: EntityPage) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let offset = page.offset;

        for record in page.records {
            if self.active_only && !record.is_active() {
                continue;
            }

            let key = record.identity_key();
            if key.is_empty() {
                continue;
            }

            if self.seen.insert(key) {
                self.records.push(record);
                outcome.accepted += 1;
            } else {
                outcome.duplicates += 1;
            }
        }

        debug!(
            offset = page.offset,
            accepted = outcome.accepted,
            duplicates = outcome.duplicates,
            total_unique = self.records.len(),
            "Merged page into accumulated set"
        );

        outcome
    }

    /// Number of unique entities accumulated so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the accumulated set is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the accumulator, yielding records in first-seen order.
    pub fn into_records(self) -> Vec<EntityRecord> {
        self.records
    }
}
