//! StateRepository interface tests.
//!
//! These tests verify the contract of the StateRepository trait.
//! Each storage implementation should run these tests.

use dozor::domain::{ComponentId, ComponentState, StateMap};
use dozor::storage::StateRepository;

fn id(name: &str) -> ComponentId {
    ComponentId::from_name(name)
}

pub async fn test_save_and_load<S: StateRepository>(store: &S) {
    let states = StateMap::from([
        (id("test_state_a"), ComponentState::Critical),
        (id("test_state_b"), ComponentState::Impacted),
    ]);

    store.save_all(&states).await.expect("save should succeed");
    let loaded = store.load_all().await.expect("load should succeed");

    assert_eq!(loaded.get(&id("test_state_a")), Some(&ComponentState::Critical));
    assert_eq!(loaded.get(&id("test_state_b")), Some(&ComponentState::Impacted));
}

pub async fn test_save_overwrites<S: StateRepository>(store: &S) {
    let component = id("test_state_overwrite");

    store
        .save_all(&StateMap::from([(component, ComponentState::Degraded)]))
        .await
        .expect("first save should succeed");
    store
        .save_all(&StateMap::from([(component, ComponentState::Healthy)]))
        .await
        .expect("second save should succeed");

    let loaded = store.load_all().await.expect("load should succeed");
    assert_eq!(loaded.get(&component), Some(&ComponentState::Healthy));
}

pub async fn test_save_keeps_other_entries<S: StateRepository>(store: &S) {
    store
        .save_all(&StateMap::from([(id("test_state_keep_1"), ComponentState::Unknown)]))
        .await
        .expect("first save should succeed");
    store
        .save_all(&StateMap::from([(id("test_state_keep_2"), ComponentState::Critical)]))
        .await
        .expect("second save should succeed");

    let loaded = store.load_all().await.expect("load should succeed");
    assert_eq!(loaded.get(&id("test_state_keep_1")), Some(&ComponentState::Unknown));
    assert_eq!(loaded.get(&id("test_state_keep_2")), Some(&ComponentState::Critical));
}

pub async fn test_save_empty_is_noop<S: StateRepository>(store: &S) {
    let before = store.load_all().await.expect("load should succeed");
    store
        .save_all(&StateMap::new())
        .await
        .expect("empty save should succeed");
    let after = store.load_all().await.expect("load should succeed");
    assert_eq!(before, after);
}

/// Run all StateRepository tests against a store.
#[macro_export]
macro_rules! run_state_repository_tests {
    ($store:expr) => {
        use $crate::storage::state_repository_tests::*;

        test_save_and_load($store).await;
        println!("  test_save_and_load: PASSED");

        test_save_overwrites($store).await;
        println!("  test_save_overwrites: PASSED");

        test_save_keeps_other_entries($store).await;
        println!("  test_save_keeps_other_entries: PASSED");

        test_save_empty_is_noop($store).await;
        println!("  test_save_empty_is_noop: PASSED");
    };
}
