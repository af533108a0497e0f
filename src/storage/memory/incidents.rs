//! In-memory incident repository.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::incident::{ActiveIncidents, Incident, IncidentTransition};
use crate::storage::{IncidentRepository, Result, StorageError};

/// Incidents keyed by id, plus every transition ever saved.
#[derive(Default)]
pub struct InMemoryIncidentRepository {
    incidents: RwLock<HashMap<Uuid, Incident>>,
    transitions: RwLock<Vec<IncidentTransition>>,
    fail_on_save: RwLock<bool>,
}

impl InMemoryIncidentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_save(&self, fail: bool) {
        *self.fail_on_save.write().await = fail;
    }

    /// Every incident, open or resolved.
    pub async fn all(&self) -> Vec<Incident> {
        let mut incidents: Vec<Incident> =
            self.incidents.read().await.values().cloned().collect();
        incidents.sort_by_key(|i| i.started_at);
        incidents
    }

    /// Transitions in the order they were saved.
    pub async fn transitions(&self) -> Vec<IncidentTransition> {
        self.transitions.read().await.clone()
    }
}

#[async_trait]
impl IncidentRepository for InMemoryIncidentRepository {
    async fn load_active(&self) -> Result<ActiveIncidents> {
        Ok(self
            .incidents
            .read()
            .await
            .values()
            .filter(|i| i.is_open())
            .map(|i| (i.root_component_id, i.clone()))
            .collect())
    }

    async fn save_transition(&self, transition: &IncidentTransition) -> Result<()> {
        if *self.fail_on_save.read().await {
            return Err(StorageError::Unavailable(
                "incident repository rejected save".to_string(),
            ));
        }

        let mut incidents = self.incidents.write().await;
        for opened in &transition.opened {
            let root_has_open = incidents
                .values()
                .any(|i| i.is_open() && i.root_component_id == opened.root_component_id);
            if !root_has_open && !incidents.contains_key(&opened.id) {
                incidents.insert(opened.id, opened.clone());
            }
        }
        for resolved in &transition.resolved {
            if let Some(stored) = incidents.get_mut(&resolved.id) {
                if stored.is_open() {
                    *stored = resolved.clone();
                }
            }
        }
        drop(incidents);

        if !transition.is_empty() {
            self.transitions.write().await.push(transition.clone());
        }
        Ok(())
    }
}
