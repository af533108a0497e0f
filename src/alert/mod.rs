//! Alert delivery for incident transitions.
//!
//! The evaluation engine hands every pass's [`IncidentTransition`] to an
//! [`AlertPublisher`]. Publishers record each delivery attempt through an
//! [`AlertDeliveryRecorder`]; a failed delivery never fails the pass.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::error;
use uuid::Uuid;

use crate::domain::StateMap;
use crate::graph::DependencyGraph;
use crate::incident::IncidentTransition;
use crate::storage::{AlertDeliveryRecorder, StorageError};

pub mod telegram;

pub use telegram::{TelegramAlertPublisher, TelegramConfig};

/// Result type for alert delivery.
pub type Result<T> = std::result::Result<T, AlertError>;

/// Errors raised by alert publishers.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Delivery via {channel} failed: {message}")]
    Delivery {
        channel: AlertChannel,
        message: String,
    },

    #[error("Failed to record delivery: {0}")]
    Storage(#[from] StorageError),

    #[error("Alert configuration error: {0}")]
    Config(String),
}

/// Whether an alert announces an opened or a resolved incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertType {
    Open,
    Resolved,
}

impl AlertType {
    pub fn code(self) -> i16 {
        match self {
            AlertType::Open => 0,
            AlertType::Resolved => 1,
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertType::Open => write!(f, "OPEN"),
            AlertType::Resolved => write!(f, "RESOLVED"),
        }
    }
}

/// Delivery channel an alert went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertChannel {
    Internal,
    Telegram,
}

impl AlertChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertChannel::Internal => "internal",
            AlertChannel::Telegram => "telegram",
        }
    }
}

impl fmt::Display for AlertChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertDeliveryStatus {
    Sent,
    Failed,
}

impl AlertDeliveryStatus {
    pub fn code(self) -> i16 {
        match self {
            AlertDeliveryStatus::Sent => 0,
            AlertDeliveryStatus::Failed => 1,
        }
    }
}

/// One delivery attempt for one incident on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDeliveryRecord {
    pub incident_id: Uuid,
    pub alert_type: AlertType,
    pub sent_at: DateTime<Utc>,
    pub channel: AlertChannel,
    pub status: AlertDeliveryStatus,
    pub error_message: Option<String>,
}

impl AlertDeliveryRecord {
    pub fn sent(
        incident_id: Uuid,
        alert_type: AlertType,
        channel: AlertChannel,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            incident_id,
            alert_type,
            sent_at,
            channel,
            status: AlertDeliveryStatus::Sent,
            error_message: None,
        }
    }

    pub fn failed(
        incident_id: Uuid,
        alert_type: AlertType,
        channel: AlertChannel,
        sent_at: DateTime<Utc>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            incident_id,
            alert_type,
            sent_at,
            channel,
            status: AlertDeliveryStatus::Failed,
            error_message: Some(error_message.into()),
        }
    }
}

/// Graph-wide view of the pass that produced a transition.
#[derive(Debug, Clone, Copy)]
pub struct AlertSnapshot<'a> {
    pub effective_states: &'a StateMap,
    pub graph: &'a DependencyGraph,
}

/// Delivers incident transitions.
#[async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish(
        &self,
        transition: &IncidentTransition,
        snapshot: &AlertSnapshot<'_>,
        now: DateTime<Utc>,
    ) -> Result<()>;
}

/// Records every transition as delivered on the internal channel.
pub struct RecordingAlertPublisher {
    recorder: Arc<dyn AlertDeliveryRecorder>,
}

impl RecordingAlertPublisher {
    pub fn new(recorder: Arc<dyn AlertDeliveryRecorder>) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl AlertPublisher for RecordingAlertPublisher {
    async fn publish(
        &self,
        transition: &IncidentTransition,
        _snapshot: &AlertSnapshot<'_>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if transition.is_empty() {
            return Ok(());
        }

        let records: Vec<AlertDeliveryRecord> = transition
            .opened
            .iter()
            .map(|i| (i, AlertType::Open))
            .chain(transition.resolved.iter().map(|i| (i, AlertType::Resolved)))
            .map(|(incident, alert_type)| {
                AlertDeliveryRecord::sent(incident.id, alert_type, AlertChannel::Internal, now)
            })
            .collect();

        self.recorder.record(&records).await?;
        Ok(())
    }
}

/// Fans a transition out to several publishers.
///
/// Every delegate runs even if an earlier one fails; the first error is
/// returned afterwards.
pub struct CompositeAlertPublisher {
    delegates: Vec<Arc<dyn AlertPublisher>>,
}

impl CompositeAlertPublisher {
    pub fn new(delegates: Vec<Arc<dyn AlertPublisher>>) -> Self {
        Self { delegates }
    }
}

#[async_trait]
impl AlertPublisher for CompositeAlertPublisher {
    async fn publish(
        &self,
        transition: &IncidentTransition,
        snapshot: &AlertSnapshot<'_>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut first_error = None;
        for delegate in &self.delegates {
            if let Err(e) = delegate.publish(transition, snapshot, now).await {
                error!(error = %e, "Alert publisher failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Captures published transitions.
#[derive(Default)]
pub struct InMemoryAlertPublisher {
    published: RwLock<Vec<(IncidentTransition, DateTime<Utc>)>>,
    fail_on_publish: RwLock<bool>,
}

impl InMemoryAlertPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.fail_on_publish.write().await = fail;
    }

    /// Transitions in publish order, with the pass time.
    pub async fn published(&self) -> Vec<(IncidentTransition, DateTime<Utc>)> {
        self.published.read().await.clone()
    }
}

#[async_trait]
impl AlertPublisher for InMemoryAlertPublisher {
    async fn publish(
        &self,
        transition: &IncidentTransition,
        _snapshot: &AlertSnapshot<'_>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if *self.fail_on_publish.read().await {
            return Err(AlertError::Delivery {
                channel: AlertChannel::Internal,
                message: "publisher configured to fail".to_string(),
            });
        }
        self.published.write().await.push((transition.clone(), now));
        Ok(())
    }
}
