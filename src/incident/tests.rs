use chrono::{Duration, TimeZone};

use super::*;
use crate::graph::DependencyEdge;

fn id(name: &str) -> ComponentId {
    ComponentId::from_name(name)
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 22, 12, 0, 0).unwrap()
}

fn states(entries: &[(&str, ComponentState)]) -> StateMap {
    entries.iter().map(|(n, s)| (id(n), *s)).collect()
}

fn db_api() -> DependencyGraph {
    DependencyGraph::from([id("db"), id("api")], [DependencyEdge::new(id("db"), id("api"))])
        .unwrap()
}

#[test]
fn test_opens_incident_for_root_critical_transition() {
    let transition = DeterministicIncidentEngine::new().detect_transitions(
        &states(&[("db", ComponentState::Healthy), ("api", ComponentState::Healthy)]),
        &states(&[("db", ComponentState::Critical), ("api", ComponentState::Impacted)]),
        &ActiveIncidents::new(),
        &db_api(),
        now(),
    );

    assert_eq!(transition.opened.len(), 1);
    let incident = &transition.opened[0];
    assert_eq!(incident.root_component_id, id("db"));
    assert_eq!(incident.started_at, now());
    assert_eq!(incident.status, IncidentStatus::Open);
    assert!(incident.resolved_at.is_none());
    assert!(transition.resolved.is_empty());
}

#[test]
fn test_does_not_open_incident_for_non_root_critical_component() {
    let transition = DeterministicIncidentEngine::new().detect_transitions(
        &states(&[("db", ComponentState::Healthy), ("api", ComponentState::Healthy)]),
        &states(&[("db", ComponentState::Critical), ("api", ComponentState::Critical)]),
        &ActiveIncidents::new(),
        &db_api(),
        now(),
    );

    assert_eq!(transition.opened.len(), 1);
    assert_eq!(transition.opened[0].root_component_id, id("db"));
}

#[test]
fn test_does_not_reopen_while_incident_is_active() {
    let active = Incident::open(id("db"), now() - Duration::seconds(60));
    let transition = DeterministicIncidentEngine::new().detect_transitions(
        &states(&[("db", ComponentState::Healthy)]),
        &states(&[("db", ComponentState::Critical)]),
        &ActiveIncidents::from([(id("db"), active)]),
        &db_api(),
        now(),
    );

    assert!(transition.is_empty());
}

#[test]
fn test_staying_critical_opens_nothing() {
    let transition = DeterministicIncidentEngine::new().detect_transitions(
        &states(&[("db", ComponentState::Critical)]),
        &states(&[("db", ComponentState::Critical)]),
        &ActiveIncidents::new(),
        &db_api(),
        now(),
    );

    assert!(transition.is_empty());
}

#[test]
fn test_resolves_incident_when_root_leaves_critical() {
    let graph = DependencyGraph::from([id("db")], []).unwrap();
    let active = Incident::open(id("db"), now() - Duration::seconds(60));

    let transition = DeterministicIncidentEngine::new().detect_transitions(
        &states(&[("db", ComponentState::Critical)]),
        &states(&[("db", ComponentState::Healthy)]),
        &ActiveIncidents::from([(id("db"), active.clone())]),
        &graph,
        now(),
    );

    assert!(transition.opened.is_empty());
    assert_eq!(transition.resolved.len(), 1);
    let resolved = &transition.resolved[0];
    assert_eq!(resolved.id, active.id);
    assert_eq!(resolved.status, IncidentStatus::Resolved);
    assert_eq!(resolved.resolved_at, Some(now()));
    assert_eq!(resolved.started_at, active.started_at);
}

#[test]
fn test_resolution_ignores_root_candidacy() {
    // api had its own incident; db failing afterwards does not keep it open.
    let active = Incident::open(id("api"), now() - Duration::seconds(60));

    let transition = DeterministicIncidentEngine::new().detect_transitions(
        &states(&[("db", ComponentState::Healthy), ("api", ComponentState::Critical)]),
        &states(&[("db", ComponentState::Critical), ("api", ComponentState::Impacted)]),
        &ActiveIncidents::from([(id("api"), active)]),
        &db_api(),
        now(),
    );

    assert_eq!(transition.opened.len(), 1);
    assert_eq!(transition.opened[0].root_component_id, id("db"));
    assert_eq!(transition.resolved.len(), 1);
    assert_eq!(transition.resolved[0].root_component_id, id("api"));
}

#[test]
fn test_root_causes_exclude_components_with_critical_ancestors() {
    let graph = DependencyGraph::from(
        [id("db"), id("api"), id("cache")],
        [DependencyEdge::new(id("db"), id("api"))],
    )
    .unwrap();
    let current = states(&[
        ("db", ComponentState::Critical),
        ("api", ComponentState::Critical),
        ("cache", ComponentState::Critical),
    ]);

    let roots = root_causes(&current, &graph);

    assert_eq!(roots.len(), 2);
    assert!(roots.contains(&id("db")));
    assert!(roots.contains(&id("cache")));
    assert!(!roots.contains(&id("api")));
}

#[test]
fn test_status_codes() {
    assert_eq!(IncidentStatus::from_code(IncidentStatus::Open.code()), Some(IncidentStatus::Open));
    assert_eq!(
        IncidentStatus::from_code(IncidentStatus::Resolved.code()),
        Some(IncidentStatus::Resolved)
    );
    assert_eq!(IncidentStatus::from_code(7), None);
}
