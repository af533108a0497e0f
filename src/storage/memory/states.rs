//! In-memory state repository.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::StateMap;
use crate::storage::{Result, StateRepository, StorageError};

/// Effective states held in a map.
#[derive(Default)]
pub struct InMemoryStateRepository {
    states: RwLock<StateMap>,
    fail_on_save: RwLock<bool>,
}

impl InMemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from previously persisted states.
    pub fn with_states(states: StateMap) -> Self {
        Self {
            states: RwLock::new(states),
            fail_on_save: RwLock::new(false),
        }
    }

    pub async fn set_fail_on_save(&self, fail: bool) {
        *self.fail_on_save.write().await = fail;
    }
}

#[async_trait]
impl StateRepository for InMemoryStateRepository {
    async fn load_all(&self) -> Result<StateMap> {
        Ok(self.states.read().await.clone())
    }

    async fn save_all(&self, states: &StateMap) -> Result<()> {
        if *self.fail_on_save.read().await {
            return Err(StorageError::Unavailable(
                "state repository rejected save".to_string(),
            ));
        }
        let mut stored = self.states.write().await;
        stored.extend(states.iter().map(|(id, state)| (*id, *state)));
        Ok(())
    }
}
