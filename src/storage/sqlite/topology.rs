//! Persisting the declared topology.

use chrono::Utc;
use sea_query::{OnConflict, Query, SqliteQueryBuilder};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool};
use tracing::info;

use super::{begin_immediate, finish, to_nanos};
use crate::domain::Component;
use crate::graph::DependencyEdge;
use crate::storage::schema::{Components, Dependencies};
use crate::storage::Result;

/// Upsert declared components and dependency edges.
///
/// Names are refreshed for existing ids; edges already present are kept.
pub async fn seed_topology(
    pool: &SqlitePool,
    components: &[Component],
    edges: &[DependencyEdge],
) -> Result<()> {
    let mut conn = begin_immediate(pool).await?;
    let result = insert_topology(&mut conn, components, edges).await;
    finish(conn, result).await?;

    info!(
        components = components.len(),
        dependencies = edges.len(),
        "Seeded topology"
    );
    Ok(())
}

async fn insert_topology(
    conn: &mut PoolConnection<Sqlite>,
    components: &[Component],
    edges: &[DependencyEdge],
) -> Result<()> {
    let created_at = to_nanos(Utc::now())?;

    for component in components {
        let query = Query::insert()
            .into_table(Components::Table)
            .columns([Components::Id, Components::Name, Components::CreatedAt])
            .values_panic([
                component.id.to_string().into(),
                component.name.as_str().into(),
                created_at.into(),
            ])
            .on_conflict(
                OnConflict::column(Components::Id)
                    .update_column(Components::Name)
                    .to_owned(),
            )
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut **conn).await?;
    }

    for edge in edges {
        let query = Query::insert()
            .into_table(Dependencies::Table)
            .columns([
                Dependencies::UpstreamComponentId,
                Dependencies::DownstreamComponentId,
            ])
            .values_panic([
                edge.upstream.to_string().into(),
                edge.downstream.to_string().into(),
            ])
            .on_conflict(
                OnConflict::columns([
                    Dependencies::UpstreamComponentId,
                    Dependencies::DownstreamComponentId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&mut **conn).await?;
    }

    Ok(())
}
