//! Frame history and state transition rows

use chrono::Utc;
use cwm_common::db::{FrameRecord, StateTransition};
use cwm_common::Result;
use sqlx::{Pool, Sqlite};

use super::format_timestamp;

/// Insert a frame and its attention metric in one transaction
///
/// Also registers the student and their participation in the session on
/// first sight. A known student's name is only overwritten by a new
/// non-empty name.
pub async fn insert_frame(db: &Pool<Sqlite>, frame: &FrameRecord) -> Result<()> {
    let mut tx = db.begin().await?;
    let now = format_timestamp(Utc::now());

    sqlx::query(
        r#"
        INSERT INTO students (id, name, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET name = COALESCE(excluded.name, students.name)
        "#,
    )
    .bind(&frame.student_id)
    .bind(&frame.student_name)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT OR IGNORE INTO session_participants (session_id, student_id, joined_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(frame.session_id.to_string())
    .bind(&frame.student_id)
    .bind(format_timestamp(frame.timestamp))
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO frame_log (id, session_id, student_id, timestamp, similarity_score, stable_label, is_significant)
        VALUES (?, ?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(frame.id.to_string())
    .bind(frame.session_id.to_string())
    .bind(&frame.student_id)
    .bind(format_timestamp(frame.timestamp))
    .bind(frame.similarity_score)
    .bind(frame.stable_label.as_str())
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO attention_metric (frame_log_id, attention_score) VALUES (?, ?)")
        .bind(frame.id.to_string())
        .bind(frame.raw_label.score())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn insert_transition(db: &Pool<Sqlite>, transition: &StateTransition) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO state_transitions (session_id, student_id, from_state, to_state, at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(transition.session_id.to_string())
    .bind(&transition.student_id)
    .bind(transition.from_state.as_str())
    .bind(transition.to_state.as_str())
    .bind(format_timestamp(transition.at))
    .execute(db)
    .await?;

    Ok(())
}
