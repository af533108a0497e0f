//! Evaluation pass orchestration.
//!
//! One pass: load the persisted effective states, evaluate the dirty
//! components in isolation, propagate across the graph, detect incident
//! transitions, persist, then publish alerts.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::alert::{AlertPublisher, AlertSnapshot};
use crate::domain::{ComponentId, ComponentState, StateMap, ThresholdConfig};
use crate::graph::DependencyGraph;
use crate::incident::{
    root_causes, DeterministicIncidentEngine, IncidentEngine, IncidentTransition,
};
use crate::propagation::{DeterministicPropagationEngine, PropagationEngine};
use crate::state::{DeterministicStateEvaluator, StateEvaluator};
use crate::storage::{IncidentRepository, SignalRepository, StateRepository, StorageError};

/// Result type for evaluation.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that abort an evaluation pass.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Threshold config missing for component: {0}")]
    MissingThreshold(ComponentId),
}

/// Threshold lookup per component.
pub trait ThresholdProvider: Send + Sync {
    /// Fails for components without configuration.
    fn config_for(&self, component_id: &ComponentId) -> Result<ThresholdConfig>;
}

/// Thresholds fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticThresholdProvider {
    configs: HashMap<ComponentId, ThresholdConfig>,
    fallback: Option<ThresholdConfig>,
}

impl StaticThresholdProvider {
    pub fn new(configs: HashMap<ComponentId, ThresholdConfig>) -> Self {
        Self {
            configs,
            fallback: None,
        }
    }

    /// The same thresholds for every component.
    pub fn uniform(config: ThresholdConfig) -> Self {
        Self {
            configs: HashMap::new(),
            fallback: Some(config),
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl ThresholdProvider for StaticThresholdProvider {
    fn config_for(&self, component_id: &ComponentId) -> Result<ThresholdConfig> {
        self.configs
            .get(component_id)
            .copied()
            .or(self.fallback)
            .ok_or(EngineError::MissingThreshold(*component_id))
    }
}

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationResult {
    /// Freshly evaluated isolated states, dirty components only.
    pub isolated_states: StateMap,
    /// Effective state of every component after propagation.
    pub effective_states: StateMap,
    /// CRITICAL components with no CRITICAL ancestor.
    pub root_causes: BTreeSet<ComponentId>,
    pub incident_transition: IncidentTransition,
}

/// Runs evaluation passes. Passes must not run concurrently.
#[async_trait]
pub trait EvaluationEngine: Send + Sync {
    async fn evaluate(
        &self,
        dirty_components: &BTreeSet<ComponentId>,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult>;
}

/// Evaluation engine over pluggable stores and deterministic strategies.
pub struct DeterministicEvaluationEngine {
    graph: Arc<DependencyGraph>,
    thresholds: Arc<dyn ThresholdProvider>,
    signals: Arc<dyn SignalRepository>,
    states: Arc<dyn StateRepository>,
    incidents: Arc<dyn IncidentRepository>,
    alerts: Arc<dyn AlertPublisher>,
    state_evaluator: Arc<dyn StateEvaluator>,
    propagation: Arc<dyn PropagationEngine>,
    incident_engine: Arc<dyn IncidentEngine>,
}

impl DeterministicEvaluationEngine {
    pub fn new(
        graph: Arc<DependencyGraph>,
        thresholds: Arc<dyn ThresholdProvider>,
        signals: Arc<dyn SignalRepository>,
        states: Arc<dyn StateRepository>,
        incidents: Arc<dyn IncidentRepository>,
        alerts: Arc<dyn AlertPublisher>,
    ) -> Self {
        Self {
            graph,
            thresholds,
            signals,
            states,
            incidents,
            alerts,
            state_evaluator: Arc::new(DeterministicStateEvaluator::new()),
            propagation: Arc::new(DeterministicPropagationEngine::new()),
            incident_engine: Arc::new(DeterministicIncidentEngine::new()),
        }
    }

    /// Replace the evaluation strategies.
    pub fn with_strategies(
        mut self,
        state_evaluator: Arc<dyn StateEvaluator>,
        propagation: Arc<dyn PropagationEngine>,
        incident_engine: Arc<dyn IncidentEngine>,
    ) -> Self {
        self.state_evaluator = state_evaluator;
        self.propagation = propagation;
        self.incident_engine = incident_engine;
        self
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Fill in UNKNOWN for graph components without a stored state.
    fn with_unknown_defaults(&self, mut states: StateMap) -> StateMap {
        for id in self.graph.components() {
            states.entry(*id).or_insert(ComponentState::Unknown);
        }
        states
    }
}

#[async_trait]
impl EvaluationEngine for DeterministicEvaluationEngine {
    #[tracing::instrument(name = "evaluation.pass", skip_all, fields(dirty = dirty_components.len()))]
    async fn evaluate(
        &self,
        dirty_components: &BTreeSet<ComponentId>,
        now: DateTime<Utc>,
    ) -> Result<EvaluationResult> {
        let previous_effective = self.with_unknown_defaults(self.states.load_all().await?);
        let active_incidents = self.incidents.load_active().await?;

        // Each dirty component sees only the pre-pass snapshot.
        let mut isolated_states = StateMap::new();
        for id in dirty_components {
            if !self.graph.contains(id) {
                warn!(component_id = %id, "Skipping dirty component outside the topology");
                continue;
            }

            let signals = self.signals.find_by_component(id).await?;
            let previous = previous_effective
                .get(id)
                .copied()
                .unwrap_or(ComponentState::Unknown);
            let config = self.thresholds.config_for(id)?;

            let state = self
                .state_evaluator
                .evaluate(&signals, previous, &config, now);
            debug!(
                component_id = %id,
                signals = signals.len(),
                previous = %previous,
                isolated = %state,
                "Evaluated component"
            );
            isolated_states.insert(*id, state);
        }

        let mut merged = previous_effective.clone();
        merged.extend(isolated_states.iter().map(|(id, state)| (*id, *state)));
        let merged = self.with_unknown_defaults(merged);

        let effective_states = self.propagation.propagate(&merged, &self.graph);
        let incident_transition = self.incident_engine.detect_transitions(
            &previous_effective,
            &effective_states,
            &active_incidents,
            &self.graph,
            now,
        );

        // Incidents before states: a retry after a failed state write must see the incident as active.
        self.incidents.save_transition(&incident_transition).await?;
        self.states.save_all(&effective_states).await?;

        let snapshot = AlertSnapshot {
            effective_states: &effective_states,
            graph: &self.graph,
        };
        if let Err(e) = self
            .alerts
            .publish(&incident_transition, &snapshot, now)
            .await
        {
            error!(error = %e, "Alert publishing failed; evaluation pass kept");
        }

        let root_causes = root_causes(&effective_states, &self.graph);

        if !incident_transition.is_empty() {
            info!(
                opened = incident_transition.opened.len(),
                resolved = incident_transition.resolved.len(),
                root_causes = root_causes.len(),
                "Incident transition"
            );
        }

        Ok(EvaluationResult {
            isolated_states,
            effective_states,
            root_causes,
            incident_transition,
        })
    }
}
