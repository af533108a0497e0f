//! SQLite storage integration tests.
//!
//! Run with: cargo test --test storage_sqlite --features sqlite
//!
//! Uses in-memory database by default, no external dependencies required.

mod storage;

use chrono::{TimeZone, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;
use uuid::Uuid;

use dozor::alert::{AlertChannel, AlertDeliveryRecord, AlertType};
use dozor::domain::Component;
use dozor::graph::DependencyEdge;
use dozor::storage::sqlite::{migrate, seed_topology};
use dozor::storage::{
    AlertDeliveryRecorder, SqliteAlertDeliveryRecorder, SqliteIncidentRepository,
    SqliteSignalStore, SqliteStateRepository,
};

/// Get SQLite connection string (in-memory for tests)
fn sqlite_uri() -> String {
    std::env::var("SQLITE_URI").unwrap_or_else(|_| "sqlite::memory:".to_string())
}

// An in-memory database lives and dies with its connection, so the pool keeps
// exactly one.
async fn connect_and_migrate() -> sqlx::SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&sqlite_uri())
        .await
        .expect("Failed to connect to SQLite");

    migrate(&pool).await.expect("Failed to run migrations");

    pool
}

#[tokio::test]
async fn test_sqlite_signal_store() {
    println!("=== SQLite signal store tests ===");
    println!("Connecting to: {}", sqlite_uri());

    let pool = connect_and_migrate().await;
    let store = SqliteSignalStore::new(pool);

    run_signal_store_tests!(&store);

    println!("=== All SQLite signal store tests PASSED ===");
}

#[tokio::test]
async fn test_sqlite_state_repository() {
    println!("=== SQLite StateRepository tests ===");

    let pool = connect_and_migrate().await;
    let store = SqliteStateRepository::new(pool);

    run_state_repository_tests!(&store);

    println!("=== All SQLite StateRepository tests PASSED ===");
}

#[tokio::test]
async fn test_sqlite_incident_repository() {
    println!("=== SQLite IncidentRepository tests ===");

    let pool = connect_and_migrate().await;
    let store = SqliteIncidentRepository::new(pool);

    run_incident_repository_tests!(&store);

    println!("=== All SQLite IncidentRepository tests PASSED ===");
}

#[tokio::test]
async fn test_sqlite_alert_records() {
    let pool = connect_and_migrate().await;
    let recorder = SqliteAlertDeliveryRecorder::new(pool.clone());
    let incident_id = Uuid::new_v4();
    let at = Utc.with_ymd_and_hms(2026, 2, 22, 12, 0, 0).unwrap();

    recorder
        .record(&[
            AlertDeliveryRecord::sent(incident_id, AlertType::Open, AlertChannel::Internal, at),
            AlertDeliveryRecord::failed(
                incident_id,
                AlertType::Open,
                AlertChannel::Telegram,
                at,
                "statusCode=400 response=bad",
            ),
        ])
        .await
        .expect("record should succeed");

    let rows = sqlx::query(
        "SELECT channel, delivery_status, error_message, type FROM alerts WHERE incident_id = ? ORDER BY channel",
    )
    .bind(incident_id.to_string())
    .fetch_all(&pool)
    .await
    .expect("query should succeed");

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get::<String, _>("channel"), "internal");
    assert_eq!(rows[0].get::<i64, _>("delivery_status"), 0);
    assert_eq!(rows[0].get::<Option<String>, _>("error_message"), None);
    assert_eq!(rows[1].get::<String, _>("channel"), "telegram");
    assert_eq!(rows[1].get::<i64, _>("delivery_status"), 1);
    assert_eq!(
        rows[1].get::<Option<String>, _>("error_message").as_deref(),
        Some("statusCode=400 response=bad")
    );
    assert!(rows.iter().all(|r| r.get::<i64, _>("type") == 0));
}

#[tokio::test]
async fn test_sqlite_seed_topology_is_repeatable() {
    let pool = connect_and_migrate().await;
    let db = Component::named("db");
    let api = Component::named("api");
    let components = vec![db.clone(), api.clone()];
    let edges = vec![DependencyEdge::new(db.id, api.id)];

    seed_topology(&pool, &components, &edges)
        .await
        .expect("first seed should succeed");
    seed_topology(&pool, &components, &edges)
        .await
        .expect("second seed should succeed");

    let names: Vec<String> = sqlx::query("SELECT name FROM components ORDER BY name")
        .fetch_all(&pool)
        .await
        .expect("query should succeed")
        .iter()
        .map(|r| r.get("name"))
        .collect();
    assert_eq!(names, vec!["api".to_string(), "db".to_string()]);

    let edge_count: i64 = sqlx::query("SELECT COUNT(*) FROM dependencies")
        .fetch_one(&pool)
        .await
        .expect("query should succeed")
        .get(0);
    assert_eq!(edge_count, 1);
}
