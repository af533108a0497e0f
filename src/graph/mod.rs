//! Component dependency graph.
//!
//! Built once at startup from the declared topology and immutable afterwards.
//! Construction validates every edge endpoint, rejects cycles, and computes a
//! deterministic topological order (Kahn's algorithm, ties broken by
//! [`ComponentId`] order) that every downstream computation iterates in.

use std::collections::{BTreeSet, HashMap, VecDeque};

use indexmap::IndexSet;

use crate::domain::ComponentId;

/// Result type for graph construction.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised while building a dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Unknown upstream component: {0}")]
    UnknownUpstream(ComponentId),

    #[error("Unknown downstream component: {0}")]
    UnknownDownstream(ComponentId),

    #[error("Dependency graph contains a cycle ({unresolved} components unresolved)")]
    Cycle { unresolved: usize },
}

/// Directed dependency: failures of `upstream` impact `downstream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyEdge {
    pub upstream: ComponentId,
    pub downstream: ComponentId,
}

impl DependencyEdge {
    pub fn new(upstream: ComponentId, downstream: ComponentId) -> Self {
        Self {
            upstream,
            downstream,
        }
    }
}

/// Immutable directed acyclic graph over component ids.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: BTreeSet<ComponentId>,
    downstream: HashMap<ComponentId, IndexSet<ComponentId>>,
    upstream: HashMap<ComponentId, IndexSet<ComponentId>>,
    topo_order: Vec<ComponentId>,
}

impl DependencyGraph {
    /// Build a graph from declared components and edges.
    ///
    /// Fails if an edge references an undeclared component or if the edges
    /// contain a cycle.
    pub fn from(
        components: impl IntoIterator<Item = ComponentId>,
        edges: impl IntoIterator<Item = DependencyEdge>,
    ) -> Result<Self> {
        let nodes: BTreeSet<ComponentId> = components.into_iter().collect();
        let edges: BTreeSet<DependencyEdge> = edges.into_iter().collect();

        for edge in &edges {
            if !nodes.contains(&edge.upstream) {
                return Err(GraphError::UnknownUpstream(edge.upstream));
            }
            if !nodes.contains(&edge.downstream) {
                return Err(GraphError::UnknownDownstream(edge.downstream));
            }
        }

        let mut downstream: HashMap<ComponentId, IndexSet<ComponentId>> =
            nodes.iter().map(|id| (*id, IndexSet::new())).collect();
        let mut upstream: HashMap<ComponentId, IndexSet<ComponentId>> =
            nodes.iter().map(|id| (*id, IndexSet::new())).collect();
        let mut indegree: HashMap<ComponentId, usize> = nodes.iter().map(|id| (*id, 0)).collect();

        for edge in &edges {
            let inserted = downstream
                .get_mut(&edge.upstream)
                .is_some_and(|set| set.insert(edge.downstream));
            if inserted {
                if let Some(set) = upstream.get_mut(&edge.downstream) {
                    set.insert(edge.upstream);
                }
                if let Some(degree) = indegree.get_mut(&edge.downstream) {
                    *degree += 1;
                }
            }
        }

        // Roots are seeded in id order; BTreeSet iteration is already sorted.
        let mut queue: VecDeque<ComponentId> = nodes
            .iter()
            .filter(|id| indegree.get(*id).copied() == Some(0))
            .copied()
            .collect();

        let mut topo_order = Vec::with_capacity(nodes.len());
        while let Some(current) = queue.pop_front() {
            topo_order.push(current);

            let mut next_nodes: Vec<ComponentId> = downstream
                .get(&current)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default();
            next_nodes.sort();

            for next in next_nodes {
                if let Some(degree) = indegree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }

        if topo_order.len() != nodes.len() {
            return Err(GraphError::Cycle {
                unresolved: nodes.len() - topo_order.len(),
            });
        }

        Ok(Self {
            nodes,
            downstream,
            upstream,
            topo_order,
        })
    }

    /// Every declared component, in id order.
    pub fn components(&self) -> &BTreeSet<ComponentId> {
        &self.nodes
    }

    pub fn contains(&self, component_id: &ComponentId) -> bool {
        self.nodes.contains(component_id)
    }

    /// Direct dependents of a component.
    pub fn downstream_of(&self, component_id: &ComponentId) -> Vec<ComponentId> {
        self.downstream
            .get(component_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Direct dependencies of a component.
    pub fn upstream_of(&self, component_id: &ComponentId) -> Vec<ComponentId> {
        self.upstream
            .get(component_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Transitive dependencies, breadth-first, excluding the component itself.
    pub fn all_upstream_of(&self, component_id: &ComponentId) -> IndexSet<ComponentId> {
        Self::reachable(&self.upstream, component_id)
    }

    /// Transitive dependents, breadth-first, excluding the component itself.
    pub fn all_downstream_of(&self, component_id: &ComponentId) -> IndexSet<ComponentId> {
        Self::reachable(&self.downstream, component_id)
    }

    /// Deterministic topological order: upstream components come first.
    pub fn topological_order(&self) -> &[ComponentId] {
        &self.topo_order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn reachable(
        adjacency: &HashMap<ComponentId, IndexSet<ComponentId>>,
        start: &ComponentId,
    ) -> IndexSet<ComponentId> {
        let mut visited = IndexSet::new();
        let mut queue: VecDeque<ComponentId> = adjacency
            .get(start)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        while let Some(current) = queue.pop_front() {
            if visited.insert(current) {
                if let Some(next) = adjacency.get(&current) {
                    queue.extend(next.iter().copied());
                }
            }
        }

        visited
    }
}
