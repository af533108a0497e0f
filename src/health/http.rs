//! HTTP probe.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

use super::{HealthCheck, HealthCheckExecutor, HealthCheckResult};

/// GETs the check URL and judges status, content type and body.
#[derive(Debug, Clone, Default)]
pub struct HttpHealthCheck {
    client: Client,
}

impl HttpHealthCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// `expected_status` 200 accepts any 2xx; anything else must match exactly.
    fn status_ok(status: StatusCode, expected: u16) -> bool {
        if expected == StatusCode::OK.as_u16() {
            status.is_success()
        } else {
            status.as_u16() == expected
        }
    }
}

#[async_trait]
impl HealthCheckExecutor for HttpHealthCheck {
    async fn execute(&self, check: &HealthCheck) -> HealthCheckResult {
        let response = match self
            .client
            .get(&check.url)
            .timeout(check.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return HealthCheckResult::unhealthy("timeout"),
            Err(e) if e.is_connect() => return HealthCheckResult::unhealthy("connect error"),
            Err(e) => return HealthCheckResult::unhealthy(format!("request error: {}", e)),
        };

        let status = response.status();
        if !Self::status_ok(status, check.expected_status) {
            return HealthCheckResult::unhealthy(format!("status={}", status.as_u16()));
        }

        if let Some(fragment) = &check.content_type_contains {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if !content_type.contains(fragment.as_str()) {
                return HealthCheckResult::unhealthy(format!("content-type={}", content_type));
            }
        }

        if let Some(fragment) = &check.body_contains {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => return HealthCheckResult::unhealthy(format!("body error: {}", e)),
            };
            if !body.contains(fragment.as_str()) {
                return HealthCheckResult::unhealthy("body mismatch");
            }
        }

        HealthCheckResult::healthy(format!("status={}", status.as_u16()))
    }
}
