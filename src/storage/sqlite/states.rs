//! SQLite state repository.

use async_trait::async_trait;
use chrono::Utc;
use sea_query::{OnConflict, Query, SqliteQueryBuilder};
use sqlx::pool::PoolConnection;
use sqlx::{Row, Sqlite, SqlitePool};

use super::{begin_immediate, finish, parse_uuid, to_nanos};
use crate::domain::{ComponentId, ComponentState, StateMap};
use crate::storage::schema::ComponentStates;
use crate::storage::{Result, StateRepository, StorageError};

/// SQLite implementation of StateRepository.
pub struct SqliteStateRepository {
    pool: SqlitePool,
}

impl SqliteStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn upsert_states(conn: &mut PoolConnection<Sqlite>, states: &StateMap) -> Result<()> {
        let updated_at = to_nanos(Utc::now())?;

        for (component_id, state) in states {
            let query = Query::insert()
                .into_table(ComponentStates::Table)
                .columns([
                    ComponentStates::ComponentId,
                    ComponentStates::State,
                    ComponentStates::UpdatedAt,
                ])
                .values_panic([
                    component_id.to_string().into(),
                    state.code().into(),
                    updated_at.into(),
                ])
                .on_conflict(
                    OnConflict::column(ComponentStates::ComponentId)
                        .update_columns([ComponentStates::State, ComponentStates::UpdatedAt])
                        .to_owned(),
                )
                .to_string(SqliteQueryBuilder);

            sqlx::query(&query).execute(&mut **conn).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl StateRepository for SqliteStateRepository {
    async fn load_all(&self) -> Result<StateMap> {
        let query = Query::select()
            .columns([ComponentStates::ComponentId, ComponentStates::State])
            .from(ComponentStates::Table)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        let mut states = StateMap::new();
        for row in rows {
            let id: String = row.get("component_id");
            let code: i64 = row.get("state");
            let state = i16::try_from(code)
                .ok()
                .and_then(ComponentState::from_code)
                .ok_or(StorageError::InvalidCode {
                    kind: "component state",
                    code,
                })?;
            states.insert(ComponentId::new(parse_uuid(&id)?), state);
        }

        Ok(states)
    }

    async fn save_all(&self, states: &StateMap) -> Result<()> {
        if states.is_empty() {
            return Ok(());
        }

        let mut conn = begin_immediate(&self.pool).await?;
        let result = Self::upsert_states(&mut conn, states).await;
        finish(conn, result).await
    }
}
