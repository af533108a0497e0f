//! Incident lifecycle detection.
//!
//! An incident is opened when a root component (no CRITICAL ancestor) enters
//! CRITICAL, and resolved when that same component leaves CRITICAL. At most one
//! incident is active per root component.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{ComponentId, ComponentState, StateMap};
use crate::graph::DependencyGraph;

/// Lifecycle status of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncidentStatus {
    Open,
    Resolved,
}

impl IncidentStatus {
    /// Persisted numeric code.
    pub fn code(self) -> i16 {
        match self {
            IncidentStatus::Open => 0,
            IncidentStatus::Resolved => 1,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(IncidentStatus::Open),
            1 => Some(IncidentStatus::Resolved),
            _ => None,
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncidentStatus::Open => write!(f, "OPEN"),
            IncidentStatus::Resolved => write!(f, "RESOLVED"),
        }
    }
}

/// A root-cause failure and its open/resolved lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incident {
    pub id: Uuid,
    pub root_component_id: ComponentId,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub status: IncidentStatus,
}

impl Incident {
    /// Open a fresh incident rooted at `root_component_id`.
    pub fn open(root_component_id: ComponentId, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            root_component_id,
            started_at,
            resolved_at: None,
            status: IncidentStatus::Open,
        }
    }

    /// The same incident, resolved at `now`.
    pub fn resolved(&self, now: DateTime<Utc>) -> Self {
        Self {
            resolved_at: Some(now),
            status: IncidentStatus::Resolved,
            ..self.clone()
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == IncidentStatus::Open
    }
}

/// Incidents opened and resolved by one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentTransition {
    pub opened: Vec<Incident>,
    pub resolved: Vec<Incident>,
}

impl IncidentTransition {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.resolved.is_empty()
    }
}

/// Active incidents keyed by root component.
pub type ActiveIncidents = HashMap<ComponentId, Incident>;

/// Detects incident transitions between two effective-state snapshots.
pub trait IncidentEngine: Send + Sync {
    fn detect_transitions(
        &self,
        previous_states: &StateMap,
        current_states: &StateMap,
        active_incidents: &ActiveIncidents,
        graph: &DependencyGraph,
        now: DateTime<Utc>,
    ) -> IncidentTransition;
}

/// Root-cause incident detection in topological order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicIncidentEngine;

impl DeterministicIncidentEngine {
    pub fn new() -> Self {
        Self
    }
}

impl IncidentEngine for DeterministicIncidentEngine {
    fn detect_transitions(
        &self,
        previous_states: &StateMap,
        current_states: &StateMap,
        active_incidents: &ActiveIncidents,
        graph: &DependencyGraph,
        now: DateTime<Utc>,
    ) -> IncidentTransition {
        let state_of = |states: &StateMap, id: &ComponentId| {
            states.get(id).copied().unwrap_or(ComponentState::Unknown)
        };

        let mut transition = IncidentTransition::default();
        for id in graph.topological_order() {
            let previous = state_of(previous_states, id);
            let current = state_of(current_states, id);

            let became_critical =
                previous != ComponentState::Critical && current == ComponentState::Critical;
            if became_critical
                && !active_incidents.contains_key(id)
                && is_root(id, current_states, graph)
            {
                transition.opened.push(Incident::open(*id, now));
            }

            if let Some(active) = active_incidents.get(id) {
                if current != ComponentState::Critical {
                    transition.resolved.push(active.resolved(now));
                }
            }
        }

        transition
    }
}

/// Whether no transitive upstream of `id` is CRITICAL in `states`.
pub fn is_root(id: &ComponentId, states: &StateMap, graph: &DependencyGraph) -> bool {
    !graph
        .all_upstream_of(id)
        .iter()
        .any(|upstream| states.get(upstream) == Some(&ComponentState::Critical))
}

/// CRITICAL graph components with no CRITICAL ancestor.
pub fn root_causes(states: &StateMap, graph: &DependencyGraph) -> BTreeSet<ComponentId> {
    graph
        .topological_order()
        .iter()
        .filter(|id| states.get(*id) == Some(&ComponentState::Critical))
        .filter(|id| is_root(id, states, graph))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests;
