//! Tests for database initialization
//!
//! - Database file is created on first run
//! - Re-opening an existing database is idempotent
//! - In-memory databases carry the full schema

use cwm_common::db::{init_database, init_memory_database};
use sqlx::SqlitePool;

async fn table_names(pool: &SqlitePool) -> Vec<String> {
    sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(pool)
        .await
        .expect("Should list tables")
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("classwatch.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("classwatch.db");

    let pool1 = init_database(&db_path).await.expect("first open");
    sqlx::query("INSERT INTO students (id, name) VALUES ('s1', 'Ada')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await.expect("second open");
    let name: String = sqlx::query_scalar("SELECT name FROM students WHERE id = 's1'")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(name, "Ada");
}

#[tokio::test]
async fn test_memory_database_has_schema() {
    let pool = init_memory_database().await.expect("memory db");
    let tables = table_names(&pool).await;

    for expected in [
        "attention_metric",
        "frame_log",
        "session_participants",
        "sessions",
        "state_transitions",
        "students",
    ] {
        assert!(
            tables.iter().any(|t| t == expected),
            "missing table {}: {:?}",
            expected,
            tables
        );
    }
}
