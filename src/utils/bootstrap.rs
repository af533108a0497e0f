//! Startup helpers for the dozor binary.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing from `DOZOR_LOG`, defaulting to `info`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Backoff used while waiting for an external dependency at startup.
fn startup_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(30)
}

/// Connect to an external dependency, retrying with exponential backoff.
///
/// `name` only labels log lines (e.g. "redis"). Returns the last error once
/// retries are exhausted.
pub async fn connect_with_retry<T, E, F, Fut>(name: &str, address: &str, connect: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let result = connect
        .retry(startup_backoff())
        .notify(|e: &E, delay: Duration| {
            warn!(dependency = name, address, error = %e, ?delay, "Connection failed, retrying");
        })
        .await;

    match &result {
        Ok(_) => info!(dependency = name, address, "Connected"),
        Err(e) => error!(dependency = name, address, error = %e, "Giving up on connection"),
    }
    result
}
