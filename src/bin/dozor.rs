//! Dozor server binary.
//!
//! Usage: `dozor [config.yaml]`

use std::sync::Arc;

use tracing::{error, info};

use dozor::alert::{
    AlertPublisher, CompositeAlertPublisher, RecordingAlertPublisher, TelegramAlertPublisher,
    TelegramConfig,
};
use dozor::api;
use dozor::config::{Config, Topology};
use dozor::engine::DeterministicEvaluationEngine;
use dozor::health::{HealthScheduler, HttpHealthCheck};
use dozor::ingestion::SignalIngestionService;
use dozor::runtime::{EvaluationRuntimeLoop, RuntimeSettings};
use dozor::storage::{init_dirty_tracking, init_storage};
use dozor::utils::bootstrap::init_tracing;
use dozor::utils::{Clock, SystemClock};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    // Every resolution error is fatal before anything starts serving.
    let evaluation = config.evaluation.resolve()?;
    let topology = Topology::resolve(&config)?;
    let checks = topology.health_checks(&config)?;

    let storage = init_storage(&config.storage, &topology).await?;
    let tracking = init_dirty_tracking(&config.redis).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut publishers: Vec<Arc<dyn AlertPublisher>> = vec![Arc::new(
        RecordingAlertPublisher::new(storage.alert_records.clone()),
    )];
    if config.telegram.enabled {
        let mut telegram = TelegramConfig::new(&config.telegram.bot_token, &config.telegram.chat_id);
        if let Some(api_base) = &config.telegram.api_base {
            telegram = telegram.with_api_base(api_base);
        }
        publishers.push(Arc::new(TelegramAlertPublisher::new(
            telegram,
            storage.alert_records.clone(),
            topology.names_by_id(),
            config.context.clone(),
        )?));
    }
    let publisher_count = publishers.len();

    let engine = Arc::new(DeterministicEvaluationEngine::new(
        topology.graph.clone(),
        topology.thresholds.clone(),
        storage.signals.clone(),
        storage.states.clone(),
        storage.incidents.clone(),
        Arc::new(CompositeAlertPublisher::new(publishers)),
    ));

    let runtime = Arc::new(EvaluationRuntimeLoop::new(
        engine,
        tracking.dirty.clone(),
        clock.clone(),
        RuntimeSettings::from_config(&evaluation, &config.runtime),
    )?);
    runtime.start().await?;

    let ingestion = Arc::new(SignalIngestionService::new(
        topology.ids_by_name(),
        storage.signal_ingestion.clone(),
        tracking.buckets.clone(),
        runtime.clone(),
        clock.clone(),
    ));

    let scheduler = Arc::new(HealthScheduler::new(
        checks,
        ingestion.clone(),
        Arc::new(HttpHealthCheck::new()),
        clock,
    ));
    scheduler.start().await;

    info!(
        project = %config.context.project,
        environment = %config.context.environment,
        components = topology.components.len(),
        dependencies = topology.edges.len(),
        checks = scheduler.checks().len(),
        storage = %config.storage.storage_type,
        redis = config.redis.enabled,
        publishers = publisher_count,
        "Dozor started"
    );

    let served = api::serve(ingestion, &config.api.bind_address(), async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested");
    })
    .await;

    scheduler.stop().await;
    runtime.stop().await;

    served?;
    info!("Dozor stopped");
    Ok(())
}
