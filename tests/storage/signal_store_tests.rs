//! Signal store interface tests.
//!
//! These tests verify the contract of SignalRepository and
//! SignalIngestionRepository. Each storage implementation should run these
//! tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use dozor::domain::{ComponentId, Severity, Signal};
use dozor::storage::{AppendOutcome, SignalIngestionRepository, SignalRepository};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 22, 12, 0, 0).unwrap()
}

pub fn make_signal(component: &str, severity: Severity, offset_secs: i64) -> Signal {
    Signal::new(
        ComponentId::from_name(component),
        severity,
        base_time() + Duration::seconds(offset_secs),
    )
}

// =============================================================================
// append / find_by_component tests
// =============================================================================

pub async fn test_append_and_find_ordered<S>(store: &S)
where
    S: SignalRepository + SignalIngestionRepository,
{
    let component = "test_sig_ordered";
    for (severity, offset) in [
        (Severity::Warning, 30),
        (Severity::Critical, 10),
        (Severity::Info, 20),
    ] {
        let outcome = store
            .append(&make_signal(component, severity, offset), "test", base_time(), None)
            .await
            .expect("append should succeed");
        assert_eq!(outcome, AppendOutcome::Inserted);
    }

    let signals = store
        .find_by_component(&ComponentId::from_name(component))
        .await
        .expect("find should succeed");

    let severities: Vec<Severity> = signals.iter().map(|s| s.severity).collect();
    assert_eq!(
        severities,
        vec![Severity::Critical, Severity::Info, Severity::Warning],
        "signals should come back oldest first"
    );
    assert_eq!(signals[0].occurred_at, base_time() + Duration::seconds(10));
}

pub async fn test_find_unknown_component_empty<S: SignalRepository>(store: &S) {
    let signals = store
        .find_by_component(&ComponentId::from_name("test_sig_nobody"))
        .await
        .expect("find should succeed");
    assert!(signals.is_empty());
}

pub async fn test_duplicate_key_stored_once<S>(store: &S)
where
    S: SignalRepository + SignalIngestionRepository,
{
    let component = "test_sig_duplicate";
    let signal = make_signal(component, Severity::Critical, 0);

    let first = store
        .append(&signal, "test", base_time(), Some("test_sig_dup_key"))
        .await
        .expect("first append should succeed");
    let second = store
        .append(&signal, "test", base_time(), Some("test_sig_dup_key"))
        .await
        .expect("second append should succeed");

    assert_eq!(first, AppendOutcome::Inserted);
    assert_eq!(second, AppendOutcome::Duplicate);

    let signals = store
        .find_by_component(&ComponentId::from_name(component))
        .await
        .expect("find should succeed");
    assert_eq!(signals.len(), 1, "duplicate should not create a record");
}

pub async fn test_missing_key_never_duplicate<S>(store: &S)
where
    S: SignalRepository + SignalIngestionRepository,
{
    let component = "test_sig_no_key";
    let signal = make_signal(component, Severity::Warning, 0);

    for _ in 0..2 {
        let outcome = store
            .append(&signal, "test", base_time(), None)
            .await
            .expect("append should succeed");
        assert_eq!(outcome, AppendOutcome::Inserted);
    }

    let signals = store
        .find_by_component(&ComponentId::from_name(component))
        .await
        .expect("find should succeed");
    assert_eq!(signals.len(), 2);
}

/// Run all signal store tests against a store.
#[macro_export]
macro_rules! run_signal_store_tests {
    ($store:expr) => {
        use $crate::storage::signal_store_tests::*;

        test_append_and_find_ordered($store).await;
        println!("  test_append_and_find_ordered: PASSED");

        test_find_unknown_component_empty($store).await;
        println!("  test_find_unknown_component_empty: PASSED");

        test_duplicate_key_stored_once($store).await;
        println!("  test_duplicate_key_stored_once: PASSED");

        test_missing_key_never_duplicate($store).await;
        println!("  test_missing_key_never_duplicate: PASSED");
    };
}
