//! In-memory dirty component set.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::domain::ComponentId;
use crate::storage::{DirtyComponentStore, Result, StorageError};

/// Dirty set guarded by a single lock; drain swaps the set out under it.
#[derive(Default)]
pub struct InMemoryDirtyComponentStore {
    dirty: Mutex<BTreeSet<ComponentId>>,
    fail_on_mark: RwLock<bool>,
}

impl InMemoryDirtyComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_mark(&self, fail: bool) {
        *self.fail_on_mark.write().await = fail;
    }

    pub async fn len(&self) -> usize {
        self.dirty.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.dirty.lock().await.is_empty()
    }
}

#[async_trait]
impl DirtyComponentStore for InMemoryDirtyComponentStore {
    async fn mark_dirty(&self, component_id: &ComponentId) -> Result<()> {
        if *self.fail_on_mark.read().await {
            return Err(StorageError::Unavailable("dirty set unavailable".to_string()));
        }
        self.dirty.lock().await.insert(*component_id);
        Ok(())
    }

    async fn drain(&self) -> Result<BTreeSet<ComponentId>> {
        Ok(std::mem::take(&mut *self.dirty.lock().await))
    }
}
