//! Time-window planning over the requested date range.
//!
//! The upstream API enforces a maximum query duration per call, so an
//! arbitrary `[start, end)` span must be split into an ordered sequence of
//! contiguous, non-overlapping sub-windows no wider than that maximum.
//! Planning is a pure function of its inputs: the same range always yields
//! the same windows, which keeps retries and tests deterministic.

use crate::TimeWindow;

/// Planning errors
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The requested range is empty or inverted
    #[error("invalid range: end ({end}) must be after start ({start})")]
    InvalidRange {
        /// Requested range start (epoch seconds)
        start: i64,
        /// Requested range end (epoch seconds)
        end: i64,
    },

    /// The maximum window duration is not positive
    #[error("invalid maximum window duration: {0} seconds")]
    InvalidMaxWindow(i64),
}

/// Split `[start, end)` into an ordered sequence of contiguous,
/// non-overlapping windows, each no wider than `max_window_secs`.
///
/// The last window may be shorter than the maximum. Together the windows
/// cover the requested range exactly once.
///
/// # Arguments
/// * `start` - Range start (epoch seconds, inclusive)
/// * `end` - Range end (epoch seconds, exclusive)
/// * `max_window_secs` - Maximum window duration enforced by the API
///
/// # Errors
/// Returns [`PlanError::InvalidRange`] if `end <= start`, and
/// [`PlanError::InvalidMaxWindow`] if the maximum duration is not positive.
/// Both are rejected before any network activity.
pub fn plan(start: i64, end: i64, max_window_secs: i64) -> Result<Vec<TimeWindow>, PlanError> {
    if end <= start {
        return Err(PlanError::InvalidRange { start, end });
    }
    if max_window_secs <= 0 {
        return Err(PlanError::InvalidMaxWindow(max_window_secs));
    }

    let mut windows = Vec::new();
    let mut window_start = start;
    while window_start < end {
        let window_end = (window_start + max_window_secs).min(end);
        windows.push(TimeWindow {
            start: window_start,
            end: window_end,
        });
        window_start = window_end;
    }

    Ok(windows)
}
