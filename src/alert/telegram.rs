//! Telegram alert delivery.
//!
//! Sends a human-readable message per opened or resolved incident through the
//! Bot API `sendMessage` method, retrying transient failures with backoff.
//! Every attempt is recorded, successful or not.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use tracing::{error, info, warn};

use super::{
    AlertChannel, AlertDeliveryRecord, AlertError, AlertPublisher, AlertSnapshot, AlertType,
    Result,
};
use crate::config::ContextConfig;
use crate::domain::{ComponentId, ComponentState};
use crate::incident::{Incident, IncidentTransition};
use crate::storage::AlertDeliveryRecorder;

/// Default Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Response bodies are cut to this many characters in logs and records.
const SUMMARY_LIMIT: usize = 200;

/// Telegram publisher configuration.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,

    /// Bot API base URL.
    pub api_base: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the API base URL.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Publishes incident transitions to a Telegram chat.
pub struct TelegramAlertPublisher {
    client: Client,
    config: TelegramConfig,
    recorder: Arc<dyn AlertDeliveryRecorder>,
    component_names: HashMap<ComponentId, String>,
    context: ContextConfig,
}

impl TelegramAlertPublisher {
    pub fn new(
        config: TelegramConfig,
        recorder: Arc<dyn AlertDeliveryRecorder>,
        component_names: HashMap<ComponentId, String>,
        context: ContextConfig,
    ) -> Result<Self> {
        if config.bot_token.trim().is_empty() || config.chat_id.trim().is_empty() {
            return Err(AlertError::Config(
                "telegram bot_token and chat_id are required".to_string(),
            ));
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config,
            recorder,
            component_names,
            context,
        })
    }

    /// Backoff configuration for retries.
    fn backoff() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(3)
            .with_jitter()
    }

    /// Determine if an HTTP error is retryable.
    fn is_retryable(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect()
    }

    /// Determine if an HTTP status code is retryable.
    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn send_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    async fn send_message(&self, text: &str) -> std::result::Result<String, SendFailure> {
        let response = self
            .client
            .post(self.send_url())
            .json(&json!({ "chat_id": self.config.chat_id, "text": text }))
            .send()
            .await
            // The request URL embeds the bot token.
            .map_err(|e| SendFailure::Http(e.without_url()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(summarize(&body))
        } else {
            Err(SendFailure::Status {
                status,
                body: summarize(&body),
            })
        }
    }

    async fn send_with_retry(&self, text: &str) -> std::result::Result<String, SendFailure> {
        (|| async { self.send_message(text).await })
            .retry(Self::backoff())
            .when(|e| match e {
                SendFailure::Http(err) => Self::is_retryable(err),
                SendFailure::Status { status, .. } => Self::is_retryable_status(*status),
            })
            .await
    }

    async fn deliver(
        &self,
        incident: &Incident,
        alert_type: AlertType,
        now: DateTime<Utc>,
        message: String,
    ) {
        let record = match self.send_with_retry(&message).await {
            Ok(response) => {
                info!(
                    alert_type = %alert_type,
                    incident_id = %incident.id,
                    response = %response,
                    "Telegram delivery succeeded"
                );
                AlertDeliveryRecord::sent(incident.id, alert_type, AlertChannel::Telegram, now)
            }
            Err(failure) => {
                let reason = failure.to_string();
                if let SendFailure::Status { status, .. } = &failure {
                    warn!(status = %status, "Telegram rejected message");
                }
                error!(
                    alert_type = %alert_type,
                    incident_id = %incident.id,
                    error = %reason,
                    "Telegram delivery failed"
                );
                AlertDeliveryRecord::failed(
                    incident.id,
                    alert_type,
                    AlertChannel::Telegram,
                    now,
                    reason,
                )
            }
        };

        if let Err(e) = self.recorder.record(std::slice::from_ref(&record)).await {
            error!(
                alert_type = %alert_type,
                incident_id = %incident.id,
                error = %e,
                "Failed to record Telegram delivery"
            );
        }
    }

    fn component_name(&self, id: &ComponentId) -> String {
        self.component_names
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    /// Names of IMPACTED components below the incident's root, sorted.
    fn impacted_components(&self, incident: &Incident, snapshot: &AlertSnapshot<'_>) -> Vec<String> {
        let mut names: Vec<String> = snapshot
            .graph
            .all_downstream_of(&incident.root_component_id)
            .iter()
            .filter(|id| snapshot.effective_states.get(*id) == Some(&ComponentState::Impacted))
            .map(|id| self.component_name(id))
            .collect();
        names.sort();
        names
    }

    fn context_lines(&self, lines: &mut Vec<String>) {
        lines.push(format!("Project: {}", self.context.project));
        lines.push(format!("Environment: {}", self.context.environment));
        if let Some(stack) = &self.context.stack {
            lines.push(format!("Stack: {}", stack));
        }
    }

    pub fn format_open(&self, incident: &Incident, snapshot: &AlertSnapshot<'_>) -> String {
        let mut lines = vec![format!("❗ INCIDENT OPEN ({})", short_id(incident))];
        self.context_lines(&mut lines);
        lines.push(format!(
            "Component: {}",
            self.component_name(&incident.root_component_id)
        ));
        lines.push("Severity: Critical".to_string());
        let impacted = self.impacted_components(incident, snapshot);
        if !impacted.is_empty() {
            lines.push(format!("Impacted: {}", impacted.join(", ")));
        }
        lines.push(format!("Started: {}", format_timestamp(incident.started_at)));
        lines.join("\n")
    }

    pub fn format_resolved(&self, incident: &Incident, now: DateTime<Utc>) -> String {
        let mut lines = vec![format!("✅ INCIDENT RESOLVED ({})", short_id(incident))];
        self.context_lines(&mut lines);
        lines.push(format!(
            "Component: {}",
            self.component_name(&incident.root_component_id)
        ));
        lines.push(format!("Resolved: {}", format_timestamp(now)));
        lines.push(format!(
            "Duration: {}",
            format_duration(incident.started_at, now)
        ));
        lines.join("\n")
    }
}

#[async_trait]
impl AlertPublisher for TelegramAlertPublisher {
    async fn publish(
        &self,
        transition: &IncidentTransition,
        snapshot: &AlertSnapshot<'_>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for incident in &transition.opened {
            let message = self.format_open(incident, snapshot);
            self.deliver(incident, AlertType::Open, now, message).await;
        }
        for incident in &transition.resolved {
            let message = self.format_resolved(incident, now);
            self.deliver(incident, AlertType::Resolved, now, message)
                .await;
        }
        Ok(())
    }
}

/// Why a single send attempt failed.
#[derive(Debug)]
enum SendFailure {
    Http(reqwest::Error),
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl std::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendFailure::Http(err) => write!(f, "{}", err),
            SendFailure::Status { status, body } => {
                write!(f, "statusCode={} response={}", status.as_u16(), body)
            }
        }
    }
}

/// First eight characters of the incident id.
fn short_id(incident: &Incident) -> String {
    incident.id.to_string().chars().take(8).collect()
}

/// `yyyy-MM-dd HH:mm:ss UTC`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// `Xm Ys` when at least a minute long, `Ys` otherwise; never negative.
pub fn format_duration(started_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total = (now - started_at).num_seconds().max(0);
    let (minutes, seconds) = (total / 60, total % 60);
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Single-line body cut to the summary limit.
fn summarize(body: &str) -> String {
    let normalized = body.replace('\n', " ");
    let normalized = normalized.trim();
    if normalized.chars().count() <= SUMMARY_LIMIT {
        normalized.to_string()
    } else {
        let cut: String = normalized.chars().take(SUMMARY_LIMIT).collect();
        format!("{}...", cut)
    }
}
