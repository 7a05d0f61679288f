//! Unit tests for the window planner

use telemetry_report::planner::{plan, PlanError};

/// Coverage, contiguity, and bound checks over a spread of ranges.
#[test]
fn test_planner_properties_hold_across_ranges() {
    let cases = [
        (0_i64, 1_i64, 1_i64),
        (0, 86_400, 48 * 3_600),
        (1_700_000_000, 1_700_000_000 + 30 * 86_400, 48 * 3_600),
        (5, 10_007, 1_000),
        (-3_600, 3_600, 1_800),
    ];

    for (start, end, max) in cases {
        let windows = plan(start, end, max).unwrap();

        assert_eq!(windows.first().unwrap().start, start);
        assert_eq!(windows.last().unwrap().end, end);
        for window in &windows {
            assert!(window.start < window.end, "window must be non-empty");
            assert!(window.duration_secs() <= max, "window exceeds maximum");
        }
        for pair in windows.windows(2) {
            assert_eq!(
                pair[0].end, pair[1].start,
                "windows must be contiguous and non-overlapping"
            );
        }

        let covered: i64 = windows.iter().map(|w| w.duration_secs()).sum();
        assert_eq!(covered, end - start, "windows must cover the range exactly");
    }
}

#[test]
fn test_window_count_matches_ceiling_division() {
    let windows = plan(0, 10 * 86_400, 48 * 3_600).unwrap();
    // 10 days at 48h per window = 5 windows
    assert_eq!(windows.len(), 5);

    let windows = plan(0, 10 * 86_400 + 1, 48 * 3_600).unwrap();
    assert_eq!(windows.len(), 6);
}

#[test]
fn test_invalid_inputs_rejected() {
    assert!(matches!(
        plan(10, 10, 100),
        Err(PlanError::InvalidRange { start: 10, end: 10 })
    ));
    assert!(matches!(plan(10, 5, 100), Err(PlanError::InvalidRange { .. })));
    assert!(matches!(plan(0, 10, -5), Err(PlanError::InvalidMaxWindow(-5))));
}
