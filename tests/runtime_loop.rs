//! Runtime loop driven through signal ingestion.
//!
//! Run with: cargo test --test runtime_loop

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;

use dozor::alert::InMemoryAlertPublisher;
use dozor::domain::{ComponentId, ComponentState, Severity, ThresholdConfig};
use dozor::engine::{
    DeterministicEvaluationEngine, EvaluationEngine, EvaluationResult, StaticThresholdProvider,
};
use dozor::graph::{DependencyEdge, DependencyGraph};
use dozor::ingestion::{SignalIngestionService, SignalIngestionStatus, SignalSubmission};
use dozor::runtime::{EvaluationRuntimeLoop, RuntimeSettings};
use dozor::storage::{
    InMemoryDirtyComponentStore, InMemoryIncidentRepository, InMemorySignalStore,
    InMemoryStateRepository, NoopTemporalBucketStore, StateRepository,
};
use dozor::utils::SystemClock;

fn id(name: &str) -> ComponentId {
    ComponentId::from_name(name)
}

/// Counts passes and their dirty sets before delegating.
struct CountingEngine {
    inner: DeterministicEvaluationEngine,
    passes: Mutex<Vec<BTreeSet<ComponentId>>>,
}

#[async_trait]
impl EvaluationEngine for CountingEngine {
    async fn evaluate(
        &self,
        dirty_components: &BTreeSet<ComponentId>,
        now: DateTime<Utc>,
    ) -> dozor::engine::Result<EvaluationResult> {
        self.passes.lock().await.push(dirty_components.clone());
        self.inner.evaluate(dirty_components, now).await
    }
}

struct Stack {
    engine: Arc<CountingEngine>,
    states: Arc<InMemoryStateRepository>,
    incidents: Arc<InMemoryIncidentRepository>,
    runtime: Arc<EvaluationRuntimeLoop>,
    ingestion: SignalIngestionService,
}

fn stack(debounce_ms: u64, queue_capacity: usize) -> Stack {
    let graph = DependencyGraph::from(
        [id("db"), id("api")],
        [DependencyEdge::new(id("db"), id("api"))],
    )
    .unwrap();
    let threshold =
        ThresholdConfig::new(3, 3, Duration::from_secs(300), Duration::from_secs(120)).unwrap();

    let signals = Arc::new(InMemorySignalStore::new());
    let states = Arc::new(InMemoryStateRepository::new());
    let incidents = Arc::new(InMemoryIncidentRepository::new());
    let dirty = Arc::new(InMemoryDirtyComponentStore::new());
    let clock = Arc::new(SystemClock);

    let engine = Arc::new(CountingEngine {
        inner: DeterministicEvaluationEngine::new(
            Arc::new(graph),
            Arc::new(StaticThresholdProvider::uniform(threshold)),
            signals.clone(),
            states.clone(),
            incidents.clone(),
            Arc::new(InMemoryAlertPublisher::new()),
        ),
        passes: Mutex::new(Vec::new()),
    });

    let runtime = Arc::new(
        EvaluationRuntimeLoop::new(
            engine.clone(),
            dirty,
            clock.clone(),
            RuntimeSettings::new(
                Duration::from_millis(debounce_ms),
                Duration::from_secs(10),
                queue_capacity,
            ),
        )
        .unwrap(),
    );

    let ingestion = SignalIngestionService::new(
        HashMap::from([
            ("db".to_string(), id("db")),
            ("api".to_string(), id("api")),
        ]),
        signals,
        Arc::new(NoopTemporalBucketStore),
        runtime.clone(),
        clock,
    );

    Stack {
        engine,
        states,
        incidents,
        runtime,
        ingestion,
    }
}

fn critical(component: &str, key: Option<String>) -> SignalSubmission {
    SignalSubmission {
        component: component.to_string(),
        severity: Severity::Critical,
        occurred_at: Utc::now() - TimeDelta::seconds(1),
        source: "test".to_string(),
        idempotency_key: key,
    }
}

#[tokio::test]
async fn test_burst_coalesced_into_single_pass() {
    let s = stack(150, 64);
    s.runtime.start().await.unwrap();

    for i in 0..5 {
        let result = s
            .ingestion
            .ingest(critical("db", Some(format!("burst-{i}"))))
            .await
            .unwrap();
        assert_eq!(result.status, SignalIngestionStatus::Accepted);
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    s.runtime.stop().await;

    let passes = s.engine.passes.lock().await.clone();
    assert_eq!(passes, vec![BTreeSet::from([id("db")])]);

    let states = s.states.load_all().await.unwrap();
    assert_eq!(states[&id("db")], ComponentState::Critical);
    assert_eq!(states[&id("api")], ComponentState::Impacted);

    let incidents = s.incidents.all().await;
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].root_component_id, id("db"));
}

#[tokio::test]
async fn test_backpressure_while_worker_stopped() {
    let s = stack(10, 2);

    for key in ["a", "b"] {
        let result = s
            .ingestion
            .ingest(critical("db", Some(key.to_string())))
            .await
            .unwrap();
        assert_eq!(result.status, SignalIngestionStatus::Accepted);
    }

    let refused = s
        .ingestion
        .ingest(critical("api", Some("c".to_string())))
        .await
        .unwrap();
    assert_eq!(refused.status, SignalIngestionStatus::Backpressure);
    assert_eq!(refused.queue_utilization, 1.0);

    // Starting the worker drains the queue and frees capacity again.
    s.runtime.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let accepted = s
        .ingestion
        .ingest(critical("api", Some("c".to_string())))
        .await
        .unwrap();
    assert_eq!(accepted.status, SignalIngestionStatus::Accepted);
    s.runtime.stop().await;
}

#[tokio::test]
async fn test_dirty_components_survive_restart() {
    let s = stack(10, 8);

    s.ingestion.ingest(critical("db", None)).await.unwrap();
    assert!(s.engine.passes.lock().await.is_empty());

    s.runtime.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    s.runtime.stop().await;

    assert_eq!(
        s.engine.passes.lock().await.clone(),
        vec![BTreeSet::from([id("db")])]
    );
}
