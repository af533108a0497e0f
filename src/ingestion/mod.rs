//! Signal admission.
//!
//! Resolves the component, applies backpressure before touching storage,
//! appends the signal and marks the component dirty for the runtime loop.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::{ComponentId, Severity, Signal};
use crate::runtime::{EvaluationRuntimeLoop, RuntimeError};
use crate::storage::{AppendOutcome, SignalIngestionRepository, StorageError, TemporalBucketStore};
use crate::utils::Clock;

/// Result type for ingestion.
pub type Result<T> = std::result::Result<T, IngestionError>;

/// Failures behind an admitted signal. Admission outcomes are statuses, not errors.
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalIngestionStatus {
    Accepted,
    Duplicate,
    UnknownComponent,
    Backpressure,
}

impl SignalIngestionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalIngestionStatus::Accepted => "accepted",
            SignalIngestionStatus::Duplicate => "duplicate",
            SignalIngestionStatus::UnknownComponent => "unknown_component",
            SignalIngestionStatus::Backpressure => "backpressure",
        }
    }
}

impl fmt::Display for SignalIngestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admission outcome plus the queue fill level at the time of the call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalIngestionResult {
    pub status: SignalIngestionStatus,
    pub queue_utilization: f64,
}

/// A signal as submitted, before the component name is resolved.
#[derive(Debug, Clone)]
pub struct SignalSubmission {
    pub component: String,
    pub severity: Severity,
    pub occurred_at: DateTime<Utc>,
    pub source: String,
    pub idempotency_key: Option<String>,
}

pub struct SignalIngestionService {
    components: HashMap<String, ComponentId>,
    repository: Arc<dyn SignalIngestionRepository>,
    buckets: Arc<dyn TemporalBucketStore>,
    runtime: Arc<EvaluationRuntimeLoop>,
    clock: Arc<dyn Clock>,
}

impl SignalIngestionService {
    pub fn new(
        components: HashMap<String, ComponentId>,
        repository: Arc<dyn SignalIngestionRepository>,
        buckets: Arc<dyn TemporalBucketStore>,
        runtime: Arc<EvaluationRuntimeLoop>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            components,
            repository,
            buckets,
            runtime,
            clock,
        }
    }

    pub fn knows(&self, component: &str) -> bool {
        self.components.contains_key(component)
    }

    pub fn queue_utilization(&self) -> f64 {
        self.runtime.queue_utilization()
    }

    fn result(&self, status: SignalIngestionStatus) -> SignalIngestionResult {
        SignalIngestionResult {
            status,
            queue_utilization: self.runtime.queue_utilization(),
        }
    }

    /// Admit one signal.
    ///
    /// Checked in order: unknown component, backpressure, duplicate key.
    /// Backpressure is decided before anything is written.
    #[tracing::instrument(
        name = "signal.ingest",
        skip_all,
        fields(component = %submission.component, severity = %submission.severity)
    )]
    pub async fn ingest(&self, submission: SignalSubmission) -> Result<SignalIngestionResult> {
        let Some(&component_id) = self.components.get(&submission.component) else {
            debug!("Unknown component");
            return Ok(self.result(SignalIngestionStatus::UnknownComponent));
        };

        if !self.runtime.can_accept() {
            warn!(
                queue_utilization = self.runtime.queue_utilization(),
                "Backpressure, signal refused"
            );
            return Ok(self.result(SignalIngestionStatus::Backpressure));
        }

        // Dirty before the append: a stored signal must never miss evaluation.
        self.runtime.mark_dirty(&component_id).await?;

        let signal = Signal::new(component_id, submission.severity, submission.occurred_at);
        let outcome = self
            .repository
            .append(
                &signal,
                &submission.source,
                self.clock.now(),
                submission.idempotency_key.as_deref(),
            )
            .await?;

        if outcome == AppendOutcome::Duplicate {
            debug!("Duplicate idempotency key");
            return Ok(self.result(SignalIngestionStatus::Duplicate));
        }

        if let Err(e) = self.buckets.add(&signal).await {
            warn!(error = %e, "Temporal bucket update failed");
        }
        self.runtime.wake(component_id);

        Ok(self.result(SignalIngestionStatus::Accepted))
    }
}

#[cfg(test)]
mod tests;
