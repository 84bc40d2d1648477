//! Session rows

use chrono::{DateTime, Utc};
use cwm_common::db::Session;
use cwm_common::Result;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};

pub async fn insert_session(db: &Pool<Sqlite>, session: &Session) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, class_id, start_time, end_time, active)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(session.id.to_string())
    .bind(&session.class_id)
    .bind(format_timestamp(session.start_time))
    .bind(session.end_time.map(format_timestamp))
    .bind(session.active)
    .execute(db)
    .await?;

    Ok(())
}

/// Only rows that are still active are updated
pub async fn end_session(
    db: &Pool<Sqlite>,
    session_id: Uuid,
    end_time: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET end_time = ?, active = 0
        WHERE id = ? AND active = 1
        "#,
    )
    .bind(format_timestamp(end_time))
    .bind(session_id.to_string())
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn find_session(db: &Pool<Sqlite>, session_id: Uuid) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, class_id, start_time, end_time, active
        FROM sessions
        WHERE id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(db)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let end_time = row
        .get::<Option<String>, _>("end_time")
        .map(|t| parse_timestamp(&t))
        .transpose()?;

    Ok(Some(Session {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        class_id: row.get("class_id"),
        start_time: parse_timestamp(&row.get::<String, _>("start_time"))?,
        end_time,
        active: row.get::<i64, _>("active") != 0,
    }))
}
