//! In-memory signal log.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{ComponentId, Signal};
use crate::storage::{AppendOutcome, Result, SignalIngestionRepository, SignalRepository};

/// Stored signal with ingestion metadata.
#[derive(Debug, Clone)]
pub struct StoredSignal {
    pub signal: Signal,
    pub source: String,
    pub ingested_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
}

#[derive(Default)]
struct Inner {
    by_component: HashMap<ComponentId, Vec<StoredSignal>>,
    idempotency_keys: HashSet<String>,
}

/// Signal log serving both the ingestion and the evaluation side.
#[derive(Default)]
pub struct InMemorySignalStore {
    inner: RwLock<Inner>,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored signals across all components.
    pub async fn len(&self) -> usize {
        self.inner
            .read()
            .await
            .by_component
            .values()
            .map(Vec::len)
            .sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stored records for a component, including ingestion metadata.
    pub async fn records_for(&self, component_id: &ComponentId) -> Vec<StoredSignal> {
        self.inner
            .read()
            .await
            .by_component
            .get(component_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SignalRepository for InMemorySignalStore {
    async fn find_by_component(&self, component_id: &ComponentId) -> Result<Vec<Signal>> {
        let inner = self.inner.read().await;
        let mut signals: Vec<Signal> = inner
            .by_component
            .get(component_id)
            .map(|records| records.iter().map(|r| r.signal).collect())
            .unwrap_or_default();
        signals.sort_by_key(|s| s.occurred_at);
        Ok(signals)
    }
}

#[async_trait]
impl SignalIngestionRepository for InMemorySignalStore {
    async fn append(
        &self,
        signal: &Signal,
        source: &str,
        ingested_at: DateTime<Utc>,
        idempotency_key: Option<&str>,
    ) -> Result<AppendOutcome> {
        let mut inner = self.inner.write().await;

        if let Some(key) = idempotency_key {
            if !inner.idempotency_keys.insert(key.to_string()) {
                return Ok(AppendOutcome::Duplicate);
            }
        }

        inner
            .by_component
            .entry(signal.component_id)
            .or_default()
            .push(StoredSignal {
                signal: *signal,
                source: source.to_string(),
                ingested_at,
                idempotency_key: idempotency_key.map(str::to_string),
            });

        Ok(AppendOutcome::Inserted)
    }
}
