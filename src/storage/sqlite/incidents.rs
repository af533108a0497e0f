//! SQLite incident repository.

use async_trait::async_trait;
use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};
use sqlx::pool::PoolConnection;
use sqlx::{Row, Sqlite, SqlitePool};

use super::{begin_immediate, finish, from_nanos, parse_uuid, to_nanos};
use crate::domain::ComponentId;
use crate::incident::{ActiveIncidents, Incident, IncidentStatus, IncidentTransition};
use crate::storage::schema::Incidents;
use crate::storage::{IncidentRepository, Result, StorageError};

/// SQLite implementation of IncidentRepository.
///
/// A partial unique index keeps at most one OPEN incident per root component.
pub struct SqliteIncidentRepository {
    pool: SqlitePool,
}

impl SqliteIncidentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn apply(conn: &mut PoolConnection<Sqlite>, transition: &IncidentTransition) -> Result<()> {
        for incident in &transition.opened {
            let root = incident.root_component_id.to_string();

            let existing = Query::select()
                .expr(Expr::col(Incidents::Id).count())
                .from(Incidents::Table)
                .and_where(Expr::col(Incidents::RootComponentId).eq(root.as_str()))
                .and_where(Expr::col(Incidents::Status).eq(IncidentStatus::Open.code()))
                .to_string(SqliteQueryBuilder);
            let open_for_root: i64 = sqlx::query(&existing).fetch_one(&mut **conn).await?.get(0);
            if open_for_root > 0 {
                continue;
            }

            let resolved_at = incident.resolved_at.map(to_nanos).transpose()?;
            let insert = Query::insert()
                .into_table(Incidents::Table)
                .columns([
                    Incidents::Id,
                    Incidents::RootComponentId,
                    Incidents::StartedAt,
                    Incidents::ResolvedAt,
                    Incidents::Status,
                ])
                .values_panic([
                    incident.id.to_string().into(),
                    root.into(),
                    to_nanos(incident.started_at)?.into(),
                    resolved_at.into(),
                    incident.status.code().into(),
                ])
                .on_conflict(OnConflict::column(Incidents::Id).do_nothing().to_owned())
                .to_string(SqliteQueryBuilder);
            sqlx::query(&insert).execute(&mut **conn).await?;
        }

        for incident in &transition.resolved {
            let resolved_at = incident.resolved_at.map(to_nanos).transpose()?;
            let update = Query::update()
                .table(Incidents::Table)
                .values([
                    (Incidents::Status, incident.status.code().into()),
                    (Incidents::ResolvedAt, resolved_at.into()),
                ])
                .and_where(Expr::col(Incidents::Id).eq(incident.id.to_string()))
                .and_where(Expr::col(Incidents::Status).eq(IncidentStatus::Open.code()))
                .to_string(SqliteQueryBuilder);
            sqlx::query(&update).execute(&mut **conn).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl IncidentRepository for SqliteIncidentRepository {
    async fn load_active(&self) -> Result<ActiveIncidents> {
        let query = Query::select()
            .columns([
                Incidents::Id,
                Incidents::RootComponentId,
                Incidents::StartedAt,
                Incidents::ResolvedAt,
                Incidents::Status,
            ])
            .from(Incidents::Table)
            .and_where(Expr::col(Incidents::Status).eq(IncidentStatus::Open.code()))
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut active = ActiveIncidents::new();
        for row in rows {
            let id: String = row.get("id");
            let root: String = row.get("root_component_id");
            let started_at: i64 = row.get("started_at");
            let resolved_at: Option<i64> = row.get("resolved_at");
            let code: i64 = row.get("status");
            let status = i16::try_from(code)
                .ok()
                .and_then(IncidentStatus::from_code)
                .ok_or(StorageError::InvalidCode {
                    kind: "incident status",
                    code,
                })?;

            let root_component_id = ComponentId::new(parse_uuid(&root)?);
            active.insert(
                root_component_id,
                Incident {
                    id: parse_uuid(&id)?,
                    root_component_id,
                    started_at: from_nanos(started_at),
                    resolved_at: resolved_at.map(from_nanos),
                    status,
                },
            );
        }

        Ok(active)
    }

    async fn save_transition(&self, transition: &IncidentTransition) -> Result<()> {
        if transition.is_empty() {
            return Ok(());
        }

        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::apply(&mut conn, transition).await;
        finish(conn, result).await
    }
}
