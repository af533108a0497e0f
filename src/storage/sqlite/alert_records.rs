//! SQLite alert delivery log.

use async_trait::async_trait;
use sea_query::{Query, SqliteQueryBuilder};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool};
use uuid::Uuid;

use super::{begin_immediate, finish, to_nanos};
use crate::alert::AlertDeliveryRecord;
use crate::storage::schema::Alerts;
use crate::storage::{AlertDeliveryRecorder, Result};

/// SQLite implementation of AlertDeliveryRecorder.
pub struct SqliteAlertDeliveryRecorder {
    pool: SqlitePool,
}

impl SqliteAlertDeliveryRecorder {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_records(
        conn: &mut PoolConnection<Sqlite>,
        records: &[AlertDeliveryRecord],
    ) -> Result<()> {
        for record in records {
            let query = Query::insert()
                .into_table(Alerts::Table)
                .columns([
                    Alerts::Id,
                    Alerts::IncidentId,
                    Alerts::Type,
                    Alerts::SentAt,
                    Alerts::Channel,
                    Alerts::DeliveryStatus,
                    Alerts::ErrorMessage,
                ])
                .values_panic([
                    Uuid::new_v4().to_string().into(),
                    record.incident_id.to_string().into(),
                    record.alert_type.code().into(),
                    to_nanos(record.sent_at)?.into(),
                    record.channel.as_str().into(),
                    record.status.code().into(),
                    record.error_message.clone().into(),
                ])
                .to_string(SqliteQueryBuilder);

            sqlx::query(&query).execute(&mut **conn).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AlertDeliveryRecorder for SqliteAlertDeliveryRecorder {
    async fn record(&self, records: &[AlertDeliveryRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::insert_records(&mut conn, records).await;
        finish(conn, result).await
    }
}
