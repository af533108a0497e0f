//! IncidentRepository interface tests.
//!
//! These tests verify the contract of the IncidentRepository trait.
//! Each storage implementation should run these tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use dozor::domain::ComponentId;
use dozor::incident::{Incident, IncidentStatus, IncidentTransition};
use dozor::storage::IncidentRepository;

fn started_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 22, 12, 0, 0).unwrap()
}

fn opened(incidents: &[&Incident]) -> IncidentTransition {
    IncidentTransition {
        opened: incidents.iter().map(|i| (*i).clone()).collect(),
        resolved: vec![],
    }
}

fn resolved(incidents: &[&Incident]) -> IncidentTransition {
    IncidentTransition {
        opened: vec![],
        resolved: incidents.iter().map(|i| (*i).clone()).collect(),
    }
}

pub async fn test_open_is_active<S: IncidentRepository>(store: &S) {
    let root = ComponentId::from_name("test_inc_open");
    let incident = Incident::open(root, started_at());

    store
        .save_transition(&opened(&[&incident]))
        .await
        .expect("save should succeed");

    let active = store.load_active().await.expect("load should succeed");
    let loaded = active.get(&root).expect("incident should be active");
    assert_eq!(loaded.id, incident.id);
    assert_eq!(loaded.started_at, started_at());
    assert_eq!(loaded.status, IncidentStatus::Open);
    assert!(loaded.resolved_at.is_none());
}

pub async fn test_open_twice_is_noop<S: IncidentRepository>(store: &S) {
    let root = ComponentId::from_name("test_inc_open_twice");
    let incident = Incident::open(root, started_at());

    store
        .save_transition(&opened(&[&incident]))
        .await
        .expect("first save should succeed");
    store
        .save_transition(&opened(&[&incident]))
        .await
        .expect("repeated save should succeed");

    let active = store.load_active().await.expect("load should succeed");
    assert_eq!(active.get(&root).map(|i| i.id), Some(incident.id));
}

pub async fn test_second_open_for_root_ignored<S: IncidentRepository>(store: &S) {
    let root = ComponentId::from_name("test_inc_second_open");
    let first = Incident::open(root, started_at());
    let second = Incident::open(root, started_at() + Duration::seconds(5));

    store
        .save_transition(&opened(&[&first]))
        .await
        .expect("first save should succeed");
    store
        .save_transition(&opened(&[&second]))
        .await
        .expect("second save should succeed");

    let active = store.load_active().await.expect("load should succeed");
    assert_eq!(
        active.get(&root).map(|i| i.id),
        Some(first.id),
        "only one incident may be open per root"
    );
}

pub async fn test_resolve_clears_active<S: IncidentRepository>(store: &S) {
    let root = ComponentId::from_name("test_inc_resolve");
    let incident = Incident::open(root, started_at());
    let now = started_at() + Duration::minutes(3);

    store
        .save_transition(&opened(&[&incident]))
        .await
        .expect("open should succeed");
    store
        .save_transition(&resolved(&[&incident.resolved(now)]))
        .await
        .expect("resolve should succeed");
    store
        .save_transition(&resolved(&[&incident.resolved(now)]))
        .await
        .expect("repeated resolve should succeed");

    let active = store.load_active().await.expect("load should succeed");
    assert!(!active.contains_key(&root));
}

pub async fn test_reopen_after_resolve<S: IncidentRepository>(store: &S) {
    let root = ComponentId::from_name("test_inc_reopen");
    let first = Incident::open(root, started_at());
    let now = started_at() + Duration::minutes(1);
    let second = Incident::open(root, now + Duration::minutes(1));

    store
        .save_transition(&opened(&[&first]))
        .await
        .expect("open should succeed");
    store
        .save_transition(&IncidentTransition {
            opened: vec![],
            resolved: vec![first.resolved(now)],
        })
        .await
        .expect("resolve should succeed");
    store
        .save_transition(&opened(&[&second]))
        .await
        .expect("reopen should succeed");

    let active = store.load_active().await.expect("load should succeed");
    assert_eq!(active.get(&root).map(|i| i.id), Some(second.id));
}

/// Run all IncidentRepository tests against a store.
#[macro_export]
macro_rules! run_incident_repository_tests {
    ($store:expr) => {
        use $crate::storage::incident_repository_tests::*;

        test_open_is_active($store).await;
        println!("  test_open_is_active: PASSED");

        test_open_twice_is_noop($store).await;
        println!("  test_open_twice_is_noop: PASSED");

        test_second_open_for_root_ignored($store).await;
        println!("  test_second_open_for_root_ignored: PASSED");

        test_resolve_clears_active($store).await;
        println!("  test_resolve_clears_active: PASSED");

        test_reopen_after_resolve($store).await;
        println!("  test_reopen_after_resolve: PASSED");
    };
}
