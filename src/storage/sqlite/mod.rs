//! SQLite implementations of the storage contracts.
//!
//! Multi-row writes run inside `BEGIN IMMEDIATE` / `COMMIT` so a failed write
//! leaves no partial rows behind. Timestamps are integer nanoseconds since the
//! Unix epoch.

mod alert_records;
mod incidents;
mod signals;
mod states;
mod topology;

use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool};
use uuid::Uuid;

use crate::storage::{Result, StorageError};

pub use alert_records::SqliteAlertDeliveryRecorder;
pub use incidents::SqliteIncidentRepository;
pub use signals::SqliteSignalStore;
pub use states::SqliteStateRepository;
pub use topology::seed_topology;

/// Apply the bundled schema migrations.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations/sqlite").run(pool).await?;
    Ok(())
}

pub(crate) fn to_nanos(at: DateTime<Utc>) -> Result<i64> {
    at.timestamp_nanos_opt()
        .ok_or(StorageError::InvalidTimestamp(at))
}

pub(crate) fn from_nanos(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Ok(Uuid::parse_str(value)?)
}

/// Acquire a connection holding the SQLite write lock.
///
/// BEGIN IMMEDIATE takes the write lock upfront so concurrent writers queue
/// instead of failing to upgrade from a shared lock.
pub(crate) async fn begin_immediate(pool: &SqlitePool) -> Result<PoolConnection<Sqlite>> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(conn)
}

/// Commit on success, roll back and return the error otherwise.
pub(crate) async fn finish<T>(mut conn: PoolConnection<Sqlite>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            sqlx::query("COMMIT").execute(&mut *conn).await?;
            Ok(value)
        }
        Err(e) => {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            Err(e)
        }
    }
}
