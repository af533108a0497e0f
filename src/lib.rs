//! Dozor - cascading-failure detection engine
//!
//! Ingests health signals per component, evaluates each component's state
//! against sliding-window thresholds, propagates failures along a dependency
//! graph, and opens one incident per root-cause failure.

pub mod alert;
pub mod api;
pub mod config;
pub mod domain;
pub mod engine;
pub mod graph;
pub mod health;
pub mod incident;
pub mod ingestion;
pub mod propagation;
pub mod runtime;
pub mod state;
pub mod storage;
pub mod utils;
