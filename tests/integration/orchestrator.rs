//! Integration tests for the fetch orchestrator state machine

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telemetry_report::engine::{EngineConfig, FetchOrchestrator, RunStatus};
use telemetry_report::fetcher::{EntitySource, FetchError, FetchResult};
use telemetry_report::shutdown::{ShutdownCoordinator, SharedShutdown};
use telemetry_report::{EntityPage, EntityRecord, PageResult, RunStats, TimeWindow};

/// Source scripted per (window start, offset), recording every logical fetch.
struct MappedSource {
    responses: Mutex<HashMap<(i64, u32), FetchResult<PageResult>>>,
    calls: Mutex<Vec<(i64, u32)>>,
}

impl MappedSource {
    fn new(responses: Vec<((i64, u32), FetchResult<PageResult>)>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(i64, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntitySource for MappedSource {
    async fn fetch_page(
        &self,
        window: &TimeWindow,
        offset: u32,
        _limit: u32,
        stats: &mut RunStats,
    ) -> FetchResult<PageResult> {
        stats.api_calls += 1;
        self.calls.lock().unwrap().push((window.start, offset));
        self.responses
            .lock()
            .unwrap()
            .remove(&(window.start, offset))
            .unwrap_or(Ok(PageResult::EndOfData))
    }
}

fn users(prefix: &str, count: usize) -> Vec<EntityRecord> {
    (0..count)
        .map(|i| EntityRecord {
            user: format!("{prefix}{i}@example.com"),
            exp_score: Some(50.0 + i as f64),
            ..Default::default()
        })
        .collect()
}

fn page(offset: u32, records: Vec<EntityRecord>) -> FetchResult<PageResult> {
    Ok(PageResult::Page(EntityPage {
        total_count_hint: records.len() as u64,
        records,
        offset,
    }))
}

fn config() -> EngineConfig {
    EngineConfig::new("https://example.com", "token")
        .with_max_window_secs(3_600)
        .with_active_only(false)
        .with_page_pause(Duration::ZERO)
}

#[tokio::test]
async fn test_full_page_then_empty_issues_exactly_two_fetches() {
    // First fetch returns exactly the page limit, so a second fetch at the
    // advanced offset is needed to observe end-of-data.
    let source = Arc::new(MappedSource::new(vec![
        ((0, 0), page(0, users("u", 100))),
        ((0, 100), Ok(PageResult::EndOfData)),
    ]));
    let orchestrator = FetchOrchestrator::new(Box::new(SharedSource(source.clone())), config());

    let outcome = orchestrator.run(0, 3_600).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(source.calls(), vec![(0, 0), (0, 100)]);
    assert_eq!(outcome.stats.api_calls, 2);
    assert_eq!(outcome.records.len(), 100);
}

#[tokio::test]
async fn test_short_page_skips_trailing_empty_fetch() {
    let source = Arc::new(MappedSource::new(vec![((0, 0), page(0, users("u", 40)))]));
    let orchestrator = FetchOrchestrator::new(Box::new(SharedSource(source.clone())), config());

    let outcome = orchestrator.run(0, 3_600).await.unwrap();

    assert_eq!(outcome.stats.api_calls, 1);
    assert_eq!(source.calls(), vec![(0, 0)]);
    assert_eq!(outcome.records.len(), 40);
}

#[tokio::test]
async fn test_duplicates_across_windows_keep_first_window_snapshot() {
    let stale = EntityRecord {
        user: "alice@example.com".to_string(),
        exp_score: Some(10.0),
        ..Default::default()
    };
    let fresh = EntityRecord {
        user: "alice@example.com".to_string(),
        exp_score: Some(99.0),
        ..Default::default()
    };
    let bob = EntityRecord {
        user: "bob@example.com".to_string(),
        exp_score: Some(50.0),
        ..Default::default()
    };

    let source = Arc::new(MappedSource::new(vec![
        ((0, 0), page(0, vec![stale])),
        ((3_600, 0), page(0, vec![fresh, bob])),
    ]));
    let orchestrator = FetchOrchestrator::new(Box::new(SharedSource(source.clone())), config());

    let outcome = orchestrator.run(0, 7_200).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.stats.duplicates_skipped, 1);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0].user, "alice@example.com");
    assert_eq!(outcome.records[0].exp_score, Some(10.0));
}

#[tokio::test]
async fn test_retry_bound_failure_preserves_prior_windows() {
    let source = Arc::new(MappedSource::new(vec![
        ((0, 0), page(0, users("first", 3))),
        (
            (3_600, 0),
            Err(FetchError::RetryBoundExceeded {
                attempts: 3,
                last_error: "server fault: 503".to_string(),
            }),
        ),
    ]));
    let orchestrator = FetchOrchestrator::new(Box::new(SharedSource(source.clone())), config());

    let outcome = orchestrator.run(0, 7_200).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Failed);
    // Entities from the window that completed before the failure survive
    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.stats.error_count(), 1);
    assert!(outcome.stats.errors[0].contains("retry bound exceeded"));
}

#[tokio::test]
async fn test_interrupt_honored_between_windows() {
    /// Serves the first window, then requests shutdown.
    struct InterruptingSource {
        shutdown: SharedShutdown,
    }

    #[async_trait]
    impl EntitySource for InterruptingSource {
        async fn fetch_page(
            &self,
            window: &TimeWindow,
            _offset: u32,
            _limit: u32,
            stats: &mut RunStats,
        ) -> FetchResult<PageResult> {
            stats.api_calls += 1;
            assert_eq!(window.start, 0, "second window must never be fetched");
            self.shutdown.request_shutdown();
            Ok(PageResult::Page(EntityPage {
                records: users("partial", 2),
                total_count_hint: 2,
                offset: 0,
            }))
        }
    }

    let shutdown = ShutdownCoordinator::shared();
    let source = InterruptingSource {
        shutdown: shutdown.clone(),
    };
    let orchestrator =
        FetchOrchestrator::new(Box::new(source), config()).with_shutdown(shutdown);

    let outcome = orchestrator.run(0, 7_200).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Interrupted);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.stats.api_calls, 1);
}

/// Adapter so tests can keep an [`Arc`] handle for assertions while the
/// orchestrator owns a boxed source.
struct SharedSource(Arc<MappedSource>);

#[async_trait]
impl EntitySource for SharedSource {
    async fn fetch_page(
        &self,
        window: &TimeWindow,
        offset: u32,
        limit: u32,
        stats: &mut RunStats,
    ) -> FetchResult<PageResult> {
        self.0.fetch_page(window, offset, limit, stats).await
    }
}
