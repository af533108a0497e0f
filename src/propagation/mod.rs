//! Failure propagation across the dependency graph.

use std::collections::BTreeSet;

use crate::domain::{ComponentId, ComponentState, StateMap};
use crate::graph::DependencyGraph;

/// Turns isolated per-component states into effective states.
pub trait PropagationEngine: Send + Sync {
    fn propagate(&self, isolated_states: &StateMap, graph: &DependencyGraph) -> StateMap;
}

/// Injects IMPACTED below every isolated CRITICAL component.
///
/// Local CRITICAL and DEGRADED verdicts are never overridden. Graph components
/// missing from the input are treated as UNKNOWN; input entries the graph does
/// not know are passed through unchanged.
///
/// An IMPACTED input is a verdict carried over from an earlier pass, not a
/// local observation. Once no upstream is CRITICAL it falls back to UNKNOWN
/// until the component's own signals are evaluated again.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicPropagationEngine;

impl DeterministicPropagationEngine {
    pub fn new() -> Self {
        Self
    }
}

impl PropagationEngine for DeterministicPropagationEngine {
    fn propagate(&self, isolated_states: &StateMap, graph: &DependencyGraph) -> StateMap {
        let critical: BTreeSet<ComponentId> = isolated_states
            .iter()
            .filter(|(_, state)| **state == ComponentState::Critical)
            .map(|(id, _)| *id)
            .collect();

        let mut effective = StateMap::new();
        for id in graph.topological_order() {
            let isolated = isolated_states
                .get(id)
                .copied()
                .unwrap_or(ComponentState::Unknown);

            let state = match isolated {
                ComponentState::Critical | ComponentState::Degraded => isolated,
                _ if graph
                    .all_upstream_of(id)
                    .iter()
                    .any(|upstream| critical.contains(upstream)) =>
                {
                    ComponentState::Impacted
                }
                ComponentState::Impacted => ComponentState::Unknown,
                _ => isolated,
            };
            effective.insert(*id, state);
        }

        for (id, state) in isolated_states {
            effective.entry(*id).or_insert(*state);
        }

        effective
    }
}
