//! Shared storage integration tests.
//!
//! Tests the repository contracts against all implementations.
//! Each implementation module imports these test functions and runs them.

pub mod incident_repository_tests;
pub mod signal_store_tests;
pub mod state_repository_tests;
