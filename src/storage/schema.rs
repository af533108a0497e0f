//! Database schema definitions using sea-query.
//!
//! Table and column identifiers for type-safe query building. The tables
//! themselves are created by the migrations under `migrations/sqlite`.

use sea_query::Iden;

/// Declared components.
#[derive(Iden)]
pub enum Components {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "name"]
    Name,
    #[iden = "created_at"]
    CreatedAt,
}

/// Declared dependency edges.
#[derive(Iden)]
pub enum Dependencies {
    Table,
    #[iden = "upstream_component_id"]
    UpstreamComponentId,
    #[iden = "downstream_component_id"]
    DownstreamComponentId,
}

/// Signal log.
#[derive(Iden)]
pub enum Signals {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "component_id"]
    ComponentId,
    #[iden = "severity"]
    Severity,
    #[iden = "source"]
    Source,
    #[iden = "occurred_at"]
    OccurredAt,
    #[iden = "ingested_at"]
    IngestedAt,
    #[iden = "idempotency_key"]
    IdempotencyKey,
}

/// Effective state per component.
#[derive(Iden)]
pub enum ComponentStates {
    #[iden = "component_state"]
    Table,
    #[iden = "component_id"]
    ComponentId,
    #[iden = "state"]
    State,
    #[iden = "updated_at"]
    UpdatedAt,
}

/// Incidents.
#[derive(Iden)]
pub enum Incidents {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "root_component_id"]
    RootComponentId,
    #[iden = "started_at"]
    StartedAt,
    #[iden = "resolved_at"]
    ResolvedAt,
    #[iden = "status"]
    Status,
}

/// Alert delivery attempts.
#[derive(Iden)]
pub enum Alerts {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "incident_id"]
    IncidentId,
    #[iden = "type"]
    Type,
    #[iden = "sent_at"]
    SentAt,
    #[iden = "channel"]
    Channel,
    #[iden = "delivery_status"]
    DeliveryStatus,
    #[iden = "error_message"]
    ErrorMessage,
}
