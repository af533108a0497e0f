use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeZone;

use super::*;
use crate::engine::{EvaluationEngine, EvaluationResult};
use crate::runtime::RuntimeSettings;
use crate::storage::{
    DirtyComponentStore, InMemoryDirtyComponentStore, InMemorySignalStore,
    InMemoryTemporalBucketStore,
};
use crate::utils::ManualClock;

struct IdleEngine;

#[async_trait]
impl EvaluationEngine for IdleEngine {
    async fn evaluate(
        &self,
        _dirty_components: &BTreeSet<ComponentId>,
        _now: DateTime<Utc>,
    ) -> crate::engine::Result<EvaluationResult> {
        Ok(EvaluationResult::default())
    }
}

struct Fixture {
    signals: Arc<InMemorySignalStore>,
    buckets: Arc<InMemoryTemporalBucketStore>,
    dirty: Arc<InMemoryDirtyComponentStore>,
    service: SignalIngestionService,
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 22, 12, 0, 0).unwrap()
}

// The runtime loop is never started, so every accepted wake-up stays queued.
fn fixture(queue_capacity: usize) -> Fixture {
    let signals = Arc::new(InMemorySignalStore::new());
    let buckets = Arc::new(InMemoryTemporalBucketStore::new());
    let dirty = Arc::new(InMemoryDirtyComponentStore::new());
    let clock = Arc::new(ManualClock::new(now()));
    let runtime = Arc::new(
        EvaluationRuntimeLoop::new(
            Arc::new(IdleEngine),
            dirty.clone(),
            clock.clone(),
            RuntimeSettings::new(Duration::from_millis(10), Duration::from_millis(10), queue_capacity),
        )
        .unwrap(),
    );
    let components = HashMap::from([
        ("db".to_string(), ComponentId::from_name("db")),
        ("api".to_string(), ComponentId::from_name("api")),
    ]);
    let service = SignalIngestionService::new(
        components,
        signals.clone(),
        buckets.clone(),
        runtime,
        clock,
    );
    Fixture {
        signals,
        buckets,
        dirty,
        service,
    }
}

fn submission(component: &str, key: Option<&str>) -> SignalSubmission {
    SignalSubmission {
        component: component.to_string(),
        severity: Severity::Critical,
        occurred_at: now(),
        source: "test".to_string(),
        idempotency_key: key.map(str::to_string),
    }
}

#[tokio::test]
async fn test_accepted_signal_is_stored_bucketed_and_dirty() {
    let f = fixture(4);
    let db = ComponentId::from_name("db");

    let result = f.service.ingest(submission("db", Some("k1"))).await.unwrap();

    assert_eq!(result.status, SignalIngestionStatus::Accepted);
    assert_eq!(result.queue_utilization, 0.25);

    let records = f.signals.records_for(&db).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source, "test");
    assert_eq!(records[0].ingested_at, now());
    assert_eq!(records[0].idempotency_key.as_deref(), Some("k1"));
    assert_eq!(f.buckets.signals_for(&db).await.len(), 1);
    assert_eq!(f.dirty.drain().await.unwrap(), BTreeSet::from([db]));
}

#[tokio::test]
async fn test_unknown_component() {
    let f = fixture(4);

    let result = f.service.ingest(submission("cache", None)).await.unwrap();

    assert_eq!(result.status, SignalIngestionStatus::UnknownComponent);
    assert!(f.signals.is_empty().await);
    assert!(!f.service.knows("cache"));
}

#[tokio::test]
async fn test_duplicate_key_not_stored_twice() {
    let f = fixture(4);

    f.service.ingest(submission("db", Some("k1"))).await.unwrap();
    let result = f.service.ingest(submission("db", Some("k1"))).await.unwrap();

    assert_eq!(result.status, SignalIngestionStatus::Duplicate);
    assert_eq!(f.signals.len().await, 1);
    assert_eq!(result.queue_utilization, 0.25);
}

#[tokio::test]
async fn test_backpressure_checked_before_duplicate_and_persistence() {
    let f = fixture(1);

    let first = f.service.ingest(submission("db", Some("k1"))).await.unwrap();
    assert_eq!(first.status, SignalIngestionStatus::Accepted);

    let fresh = f.service.ingest(submission("api", Some("k2"))).await.unwrap();
    assert_eq!(fresh.status, SignalIngestionStatus::Backpressure);
    assert_eq!(fresh.queue_utilization, 1.0);

    let repeat = f.service.ingest(submission("db", Some("k1"))).await.unwrap();
    assert_eq!(repeat.status, SignalIngestionStatus::Backpressure);

    assert_eq!(f.signals.len().await, 1);
}

#[tokio::test]
async fn test_bucket_failure_does_not_block_ingestion() {
    let f = fixture(4);
    f.buckets.set_fail_on_add(true).await;

    let result = f.service.ingest(submission("api", None)).await.unwrap();

    assert_eq!(result.status, SignalIngestionStatus::Accepted);
    assert_eq!(f.signals.len().await, 1);
    assert!(!f.dirty.is_empty().await);
}

#[tokio::test]
async fn test_dirty_mark_failure_stores_nothing_and_retry_is_accepted() {
    let f = fixture(4);
    let db = ComponentId::from_name("db");
    f.dirty.set_fail_on_mark(true).await;

    let failed = f.service.ingest(submission("db", Some("k1"))).await;
    assert!(matches!(failed, Err(IngestionError::Runtime(_))));
    assert!(f.signals.is_empty().await);

    f.dirty.set_fail_on_mark(false).await;
    let retry = f.service.ingest(submission("db", Some("k1"))).await.unwrap();

    assert_eq!(retry.status, SignalIngestionStatus::Accepted);
    assert_eq!(f.signals.len().await, 1);
    assert_eq!(f.dirty.drain().await.unwrap(), BTreeSet::from([db]));
}

#[test]
fn test_status_names() {
    assert_eq!(SignalIngestionStatus::Accepted.to_string(), "accepted");
    assert_eq!(SignalIngestionStatus::Backpressure.as_str(), "backpressure");
}
