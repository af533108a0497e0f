//! Active health checks.
//!
//! Each configured check is polled on its own interval and the outcome is fed
//! through signal ingestion like any external signal: healthy results become
//! INFO, failures WARNING, and failures at or past the check's threshold
//! CRITICAL.

mod http;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::Severity;
use crate::ingestion::{SignalIngestionService, SignalIngestionStatus, SignalSubmission};
use crate::utils::Clock;

pub use http::HttpHealthCheck;

/// Source recorded on signals produced by health checks.
pub const HEALTH_CHECK_SOURCE: &str = "health-check";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheckType {
    Http,
}

impl fmt::Display for HealthCheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthCheckType::Http => write!(f, "http"),
        }
    }
}

/// One configured check, with durations already parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    pub component: String,
    pub check_type: HealthCheckType,
    pub url: String,
    pub interval: Duration,
    pub timeout: Duration,
    /// Consecutive failures that turn WARNING into CRITICAL.
    pub failure_threshold: u32,
    pub expected_status: u16,
    pub body_contains: Option<String>,
    pub content_type_contains: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub details: String,
}

impl HealthCheckResult {
    pub fn healthy(details: impl Into<String>) -> Self {
        Self {
            healthy: true,
            details: details.into(),
        }
    }

    pub fn unhealthy(details: impl Into<String>) -> Self {
        Self {
            healthy: false,
            details: details.into(),
        }
    }
}

/// Runs a single probe. Probe failures are results, not errors.
#[async_trait]
pub trait HealthCheckExecutor: Send + Sync {
    async fn execute(&self, check: &HealthCheck) -> HealthCheckResult;
}

/// Severity for a probe outcome given the failure streak including it.
pub fn severity_for(healthy: bool, consecutive_failures: u32, failure_threshold: u32) -> Severity {
    if healthy {
        Severity::Info
    } else if consecutive_failures >= failure_threshold {
        Severity::Critical
    } else {
        Severity::Warning
    }
}

/// Polls every check on its interval and ingests the outcomes.
pub struct HealthScheduler {
    checks: Vec<HealthCheck>,
    ingestion: Arc<SignalIngestionService>,
    executor: Arc<dyn HealthCheckExecutor>,
    clock: Arc<dyn Clock>,
    consecutive_failures: Mutex<HashMap<String, u32>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HealthScheduler {
    pub fn new(
        checks: Vec<HealthCheck>,
        ingestion: Arc<SignalIngestionService>,
        executor: Arc<dyn HealthCheckExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            checks,
            ingestion,
            executor,
            clock,
            consecutive_failures: Mutex::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn checks(&self) -> &[HealthCheck] {
        &self.checks
    }

    /// Spawn one polling task per check. The first probe runs immediately.
    pub async fn start(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            return;
        }

        for (index, check) in self.checks.iter().enumerate() {
            let scheduler = Arc::clone(self);
            let period = check.interval;
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    scheduler.run_check_once(&scheduler.checks[index]).await;
                }
            }));
        }

        info!(checks = self.checks.len(), "Health scheduler started");
    }

    /// Abort every polling task.
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_empty() {
            return;
        }
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("Health scheduler stopped");
    }

    /// Probe once and ingest the outcome.
    pub async fn run_check_once(&self, check: &HealthCheck) {
        let result = match check.check_type {
            HealthCheckType::Http => self.executor.execute(check).await,
        };

        let failures = {
            let mut streaks = self.consecutive_failures.lock().await;
            let streak = streaks.entry(check.component.clone()).or_insert(0);
            *streak = if result.healthy { 0 } else { streak.saturating_add(1) };
            *streak
        };
        let severity = severity_for(result.healthy, failures, check.failure_threshold);
        debug!(
            component = %check.component,
            healthy = result.healthy,
            details = %result.details,
            failures,
            severity = %severity,
            "Health check finished"
        );

        let submission = SignalSubmission {
            component: check.component.clone(),
            severity,
            occurred_at: self.clock.now(),
            source: HEALTH_CHECK_SOURCE.to_string(),
            idempotency_key: None,
        };

        match self.ingestion.ingest(submission).await {
            Ok(outcome) if outcome.status == SignalIngestionStatus::Backpressure => {
                warn!(component = %check.component, "Health check dropped by backpressure");
            }
            Ok(_) => {}
            Err(e) => error!(component = %check.component, error = %e, "Health check ingestion failed"),
        }
    }

    /// Current failure streak for a component.
    pub async fn consecutive_failures(&self, component: &str) -> u32 {
        self.consecutive_failures
            .lock()
            .await
            .get(component)
            .copied()
            .unwrap_or(0)
    }
}
