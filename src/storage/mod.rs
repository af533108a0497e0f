//! Storage contracts and their implementations.
//!
//! The evaluation core only talks to the traits in this module. Backends:
//! - `memory`: process-local, always available
//! - `sqlite`: durable signals, states, incidents and delivery records
//! - `redis`: shared dirty set and temporal signal buckets

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::alert::AlertDeliveryRecord;
use crate::config::{RedisConfig, StorageConfig, Topology};
use crate::domain::{ComponentId, Signal, StateMap};
use crate::incident::{ActiveIncidents, IncidentTransition};

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "redis")]
pub mod redis;

pub use memory::{
    InMemoryAlertDeliveryRecorder, InMemoryDirtyComponentStore, InMemoryIncidentRepository,
    InMemorySignalStore, InMemoryStateRepository, InMemoryTemporalBucketStore,
    NoopTemporalBucketStore,
};

#[cfg(feature = "sqlite")]
pub use sqlite::{
    SqliteAlertDeliveryRecorder, SqliteIncidentRepository, SqliteSignalStore,
    SqliteStateRepository,
};

#[cfg(feature = "redis")]
pub use self::redis::{RedisDirtyComponentStore, RedisTemporalBucketStore};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "sqlite")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Timestamp out of range: {0}")]
    InvalidTimestamp(DateTime<Utc>),

    #[error("Invalid {kind} code: {code}")]
    InvalidCode { kind: &'static str, code: i64 },

    #[error("Unknown storage type: {0}")]
    UnknownType(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of appending a signal with an optional idempotency key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    Duplicate,
}

/// Read side of the signal log, used by evaluation.
#[async_trait]
pub trait SignalRepository: Send + Sync {
    /// Every stored signal for a component, oldest first.
    async fn find_by_component(&self, component_id: &ComponentId) -> Result<Vec<Signal>>;
}

/// Write side of the signal log, used by ingestion.
#[async_trait]
pub trait SignalIngestionRepository: Send + Sync {
    /// Append a signal.
    ///
    /// A repeated idempotency key stores nothing and reports `Duplicate`.
    async fn append(
        &self,
        signal: &Signal,
        source: &str,
        ingested_at: DateTime<Utc>,
        idempotency_key: Option<&str>,
    ) -> Result<AppendOutcome>;
}

/// Persisted effective state per component.
#[async_trait]
pub trait StateRepository: Send + Sync {
    async fn load_all(&self) -> Result<StateMap>;

    /// Overwrite the given entries as one unit.
    async fn save_all(&self, states: &StateMap) -> Result<()>;
}

/// Persisted incidents; the source of truth for what is active between passes.
#[async_trait]
pub trait IncidentRepository: Send + Sync {
    /// OPEN incidents keyed by root component.
    async fn load_active(&self) -> Result<ActiveIncidents>;

    /// Insert opened and update resolved incidents as one unit.
    ///
    /// Applying the same transition twice is a no-op.
    async fn save_transition(&self, transition: &IncidentTransition) -> Result<()>;
}

/// Components whose signals changed since their last evaluation.
#[async_trait]
pub trait DirtyComponentStore: Send + Sync {
    async fn mark_dirty(&self, component_id: &ComponentId) -> Result<()>;

    /// Take and clear every dirty id atomically.
    async fn drain(&self) -> Result<BTreeSet<ComponentId>>;
}

/// Best-effort secondary index of signals for time-windowed queries.
#[async_trait]
pub trait TemporalBucketStore: Send + Sync {
    async fn add(&self, signal: &Signal) -> Result<()>;
}

/// Log of alert delivery attempts.
#[async_trait]
pub trait AlertDeliveryRecorder: Send + Sync {
    async fn record(&self, records: &[AlertDeliveryRecord]) -> Result<()>;
}

/// Handles to every repository of one configured backend.
#[derive(Clone)]
pub struct Storage {
    pub signals: Arc<dyn SignalRepository>,
    pub signal_ingestion: Arc<dyn SignalIngestionRepository>,
    pub states: Arc<dyn StateRepository>,
    pub incidents: Arc<dyn IncidentRepository>,
    pub alert_records: Arc<dyn AlertDeliveryRecorder>,
}

impl Storage {
    /// Fresh process-local repositories.
    pub fn in_memory() -> Self {
        let signals = Arc::new(InMemorySignalStore::new());
        Self {
            signals: signals.clone(),
            signal_ingestion: signals,
            states: Arc::new(InMemoryStateRepository::new()),
            incidents: Arc::new(InMemoryIncidentRepository::new()),
            alert_records: Arc::new(InMemoryAlertDeliveryRecorder::new()),
        }
    }
}

/// Initialize storage based on configuration.
///
/// Durable backends have their schema migrated and the declared topology
/// seeded before the handles are returned.
pub async fn init_storage(config: &StorageConfig, topology: &Topology) -> Result<Storage> {
    info!(storage_type = %config.storage_type, path = %config.path, "Initializing storage");

    match config.storage_type.as_str() {
        "memory" => Ok(Storage::in_memory()),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            if let Some(parent) = std::path::Path::new(&config.path).parent() {
                std::fs::create_dir_all(parent)?;
            }

            let pool =
                sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", config.path)).await?;
            sqlite::migrate(&pool).await?;
            sqlite::seed_topology(&pool, &topology.components, &topology.edges).await?;

            let signals = Arc::new(SqliteSignalStore::new(pool.clone()));
            Ok(Storage {
                signals: signals.clone(),
                signal_ingestion: signals,
                states: Arc::new(SqliteStateRepository::new(pool.clone())),
                incidents: Arc::new(SqliteIncidentRepository::new(pool.clone())),
                alert_records: Arc::new(SqliteAlertDeliveryRecorder::new(pool)),
            })
        }
        #[cfg(not(feature = "sqlite"))]
        "sqlite" => {
            error!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err(StorageError::UnknownType("sqlite".to_string()))
        }
        other => {
            error!(storage_type = %other, "Unknown storage type");
            Err(StorageError::UnknownType(other.to_string()))
        }
    }
}

/// Dirty set and temporal buckets shared between ingestion and evaluation.
#[derive(Clone)]
pub struct DirtyTracking {
    pub dirty: Arc<dyn DirtyComponentStore>,
    pub buckets: Arc<dyn TemporalBucketStore>,
}

impl DirtyTracking {
    /// Process-local dirty set; temporal buckets are dropped.
    pub fn in_memory() -> Self {
        Self {
            dirty: Arc::new(InMemoryDirtyComponentStore::new()),
            buckets: Arc::new(NoopTemporalBucketStore),
        }
    }
}

/// Redis-backed tracking when enabled, process-local otherwise.
pub async fn init_dirty_tracking(config: &RedisConfig) -> Result<DirtyTracking> {
    if !config.enabled {
        info!("Redis disabled, using in-memory dirty tracking");
        return Ok(DirtyTracking::in_memory());
    }

    #[cfg(feature = "redis")]
    {
        let conn = crate::utils::bootstrap::connect_with_retry("redis", &config.uri, || {
            self::redis::connect(&config.uri)
        })
        .await?;
        let prefix = config.key_prefix.as_deref();
        Ok(DirtyTracking {
            dirty: Arc::new(RedisDirtyComponentStore::new(conn.clone(), prefix)),
            buckets: Arc::new(RedisTemporalBucketStore::new(conn, prefix)),
        })
    }

    #[cfg(not(feature = "redis"))]
    {
        error!("Redis requested but 'redis' feature is not enabled");
        Err(StorageError::UnknownType("redis".to_string()))
    }
}
