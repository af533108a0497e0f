//! Temporal bucket stores that stay inside the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{ComponentId, Signal};
use crate::storage::{Result, StorageError, TemporalBucketStore};

/// Discards every signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTemporalBucketStore;

#[async_trait]
impl TemporalBucketStore for NoopTemporalBucketStore {
    async fn add(&self, _signal: &Signal) -> Result<()> {
        Ok(())
    }
}

/// Keeps indexed signals per component, for tests.
#[derive(Default)]
pub struct InMemoryTemporalBucketStore {
    buckets: RwLock<HashMap<ComponentId, Vec<Signal>>>,
    fail_on_add: RwLock<bool>,
}

impl InMemoryTemporalBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_add(&self, fail: bool) {
        *self.fail_on_add.write().await = fail;
    }

    pub async fn signals_for(&self, component_id: &ComponentId) -> Vec<Signal> {
        self.buckets
            .read()
            .await
            .get(component_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TemporalBucketStore for InMemoryTemporalBucketStore {
    async fn add(&self, signal: &Signal) -> Result<()> {
        if *self.fail_on_add.read().await {
            return Err(StorageError::Unavailable(
                "bucket store rejected signal".to_string(),
            ));
        }
        self.buckets
            .write()
            .await
            .entry(signal.component_id)
            .or_default()
            .push(*signal);
        Ok(())
    }
}
