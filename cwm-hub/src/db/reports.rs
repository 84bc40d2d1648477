//! Aggregated attention reports

use cwm_common::db::{Participant, StudentReport};
use cwm_common::Result;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use super::parse_timestamp;

/// Per-student frame totals for a session
///
/// Students without a stored name are reported under their id. Ordered
/// by attention percentage, highest first; ties by name.
pub async fn attention_report(db: &Pool<Sqlite>, session_id: Uuid) -> Result<Vec<StudentReport>> {
    let rows = sqlx::query(
        r#"
        SELECT f.student_id AS student_id,
               COALESCE(s.name, f.student_id) AS name,
               COUNT(m.id) AS total_frames,
               COALESCE(SUM(m.attention_score), 0) AS attentive_frames,
               ROUND(100.0 * COALESCE(SUM(m.attention_score), 0) / COUNT(m.id), 2) AS attention_percentage
        FROM frame_log f
        JOIN attention_metric m ON m.frame_log_id = f.id
        LEFT JOIN students s ON s.id = f.student_id
        WHERE f.session_id = ?
        GROUP BY f.student_id
        ORDER BY attention_percentage DESC, name ASC
        "#,
    )
    .bind(session_id.to_string())
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| StudentReport {
            student_id: row.get("student_id"),
            name: row.get("name"),
            total_frames: row.get("total_frames"),
            attentive_frames: row.get("attentive_frames"),
            attention_percentage: row.get("attention_percentage"),
        })
        .collect())
}

pub async fn list_participants(db: &Pool<Sqlite>, session_id: Uuid) -> Result<Vec<Participant>> {
    let rows = sqlx::query(
        r#"
        SELECT p.student_id, s.name, p.joined_at
        FROM session_participants p
        LEFT JOIN students s ON s.id = p.student_id
        WHERE p.session_id = ?
        ORDER BY p.joined_at ASC, p.rowid ASC
        "#,
    )
    .bind(session_id.to_string())
    .fetch_all(db)
    .await?;

    rows.into_iter()
        .map(|row| {
            Ok(Participant {
                student_id: row.get("student_id"),
                name: row.get("name"),
                joined_at: parse_timestamp(&row.get::<String, _>("joined_at"))?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{frames::insert_frame, sessions::insert_session};
    use chrono::Utc;
    use cwm_common::attention::{AttentionLabel, StableState};
    use cwm_common::db::{init_memory_database, FrameRecord, Session};

    async fn record(pool: &Pool<Sqlite>, session_id: Uuid, student: &str, name: Option<&str>, labels: &[AttentionLabel]) {
        for label in labels {
            insert_frame(
                pool,
                &FrameRecord {
                    id: Uuid::new_v4(),
                    session_id,
                    student_id: student.into(),
                    student_name: name.map(String::from),
                    timestamp: Utc::now(),
                    similarity_score: None,
                    stable_label: StableState::Unknown,
                    raw_label: *label,
                },
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_report_orders_by_percentage() {
        use AttentionLabel::{Attentive as A, Inattentive as I};

        let pool = init_memory_database().await.unwrap();
        let session = Session::start(None);
        insert_session(&pool, &session).await.unwrap();
        let other = Session::start(None);
        insert_session(&pool, &other).await.unwrap();

        record(&pool, session.id, "low", Some("Lin"), &[A, I, I]).await;
        record(&pool, session.id, "high", Some("Hal"), &[A, A, A, I]).await;
        record(&pool, session.id, "anon", None, &[I]).await;
        record(&pool, other.id, "high", None, &[I, I]).await;

        let report = attention_report(&pool, session.id).await.unwrap();
        assert_eq!(report.len(), 3);

        assert_eq!(report[0].student_id, "high");
        assert_eq!(report[0].name, "Hal");
        assert_eq!(report[0].total_frames, 4);
        assert_eq!(report[0].attentive_frames, 3);
        assert_eq!(report[0].attention_percentage, 75.0);

        assert_eq!(report[1].student_id, "low");
        assert_eq!(report[1].attention_percentage, 33.33);

        assert_eq!(report[2].name, "anon");
        assert_eq!(report[2].attention_percentage, 0.0);
    }

    #[tokio::test]
    async fn test_empty_session_report() {
        let pool = init_memory_database().await.unwrap();
        let session = Session::start(None);
        insert_session(&pool, &session).await.unwrap();

        assert!(attention_report(&pool, session.id).await.unwrap().is_empty());
        assert!(list_participants(&pool, session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_participants_listed_once() {
        let pool = init_memory_database().await.unwrap();
        let session = Session::start(None);
        insert_session(&pool, &session).await.unwrap();

        record(&pool, session.id, "s-1", Some("Ada"), &[AttentionLabel::Attentive; 3]).await;
        record(&pool, session.id, "s-2", None, &[AttentionLabel::Inattentive]).await;

        let participants = list_participants(&pool, session.id).await.unwrap();
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].student_id, "s-1");
        assert_eq!(participants[0].name.as_deref(), Some("Ada"));
        assert_eq!(participants[1].name, None);
    }
}
