//! SQLite signal log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Expr, OnConflict, Order, Query, SqliteQueryBuilder};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{from_nanos, to_nanos};
use crate::domain::{ComponentId, Severity, Signal};
use crate::storage::schema::Signals;
use crate::storage::{
    AppendOutcome, Result, SignalIngestionRepository, SignalRepository, StorageError,
};

/// SQLite implementation of both signal contracts.
pub struct SqliteSignalStore {
    pool: SqlitePool,
}

impl SqliteSignalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalRepository for SqliteSignalStore {
    async fn find_by_component(&self, component_id: &ComponentId) -> Result<Vec<Signal>> {
        let query = Query::select()
            .columns([Signals::Severity, Signals::OccurredAt])
            .from(Signals::Table)
            .and_where(Expr::col(Signals::ComponentId).eq(component_id.to_string()))
            .order_by(Signals::OccurredAt, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut signals = Vec::with_capacity(rows.len());
        for row in rows {
            let code: i64 = row.get("severity");
            let severity = i16::try_from(code)
                .ok()
                .and_then(Severity::from_code)
                .ok_or(StorageError::InvalidCode {
                    kind: "severity",
                    code,
                })?;
            let occurred_at: i64 = row.get("occurred_at");
            signals.push(Signal::new(*component_id, severity, from_nanos(occurred_at)));
        }

        Ok(signals)
    }
}

#[async_trait]
impl SignalIngestionRepository for SqliteSignalStore {
    async fn append(
        &self,
        signal: &Signal,
        source: &str,
        ingested_at: DateTime<Utc>,
        idempotency_key: Option<&str>,
    ) -> Result<AppendOutcome> {
        let query = Query::insert()
            .into_table(Signals::Table)
            .columns([
                Signals::Id,
                Signals::ComponentId,
                Signals::Severity,
                Signals::Source,
                Signals::OccurredAt,
                Signals::IngestedAt,
                Signals::IdempotencyKey,
            ])
            .values_panic([
                Uuid::new_v4().to_string().into(),
                signal.component_id.to_string().into(),
                signal.severity.code().into(),
                source.into(),
                to_nanos(signal.occurred_at)?.into(),
                to_nanos(ingested_at)?.into(),
                idempotency_key.map(str::to_string).into(),
            ])
            .on_conflict(
                OnConflict::column(Signals::IdempotencyKey)
                    .do_nothing()
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);

        let result = sqlx::query(&query).execute(&self.pool).await?;

        // Zero rows means the idempotency key already existed.
        if result.rows_affected() == 0 {
            Ok(AppendOutcome::Duplicate)
        } else {
            Ok(AppendOutcome::Inserted)
        }
    }
}
