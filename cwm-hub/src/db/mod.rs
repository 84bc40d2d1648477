//! Storage for sessions, frame history and attention reports
//!
//! The pipeline and session manager depend on the `Storage` trait only;
//! `SqliteStorage` is the production implementation.

pub mod frames;
pub mod reports;
pub mod sessions;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use cwm_common::db::{FrameRecord, Participant, Session, StateTransition, StudentReport};
use cwm_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Persistence operations used by the hub
#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<()>;

    /// Mark a still-active session as ended
    ///
    /// Returns false when no row was updated (unknown or already ended).
    async fn end_session(&self, session_id: Uuid, end_time: DateTime<Utc>) -> Result<bool>;

    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>>;

    /// Store one analyzed frame together with its attention metric
    async fn record_frame(&self, frame: &FrameRecord) -> Result<()>;

    async fn record_transition(&self, transition: &StateTransition) -> Result<()>;

    /// Per-student totals for a session, best attention first
    async fn attention_report(&self, session_id: Uuid) -> Result<Vec<StudentReport>>;

    async fn list_participants(&self, session_id: Uuid) -> Result<Vec<Participant>>;
}

/// SQLite-backed storage
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_session(&self, session: &Session) -> Result<()> {
        sessions::insert_session(&self.pool, session).await
    }

    async fn end_session(&self, session_id: Uuid, end_time: DateTime<Utc>) -> Result<bool> {
        sessions::end_session(&self.pool, session_id, end_time).await
    }

    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        sessions::find_session(&self.pool, session_id).await
    }

    async fn record_frame(&self, frame: &FrameRecord) -> Result<()> {
        frames::insert_frame(&self.pool, frame).await
    }

    async fn record_transition(&self, transition: &StateTransition) -> Result<()> {
        frames::insert_transition(&self.pool, transition).await
    }

    async fn attention_report(&self, session_id: Uuid) -> Result<Vec<StudentReport>> {
        reports::attention_report(&self.pool, session_id).await
    }

    async fn list_participants(&self, session_id: Uuid) -> Result<Vec<Participant>> {
        reports::list_participants(&self.pool, session_id).await
    }
}

/// Timestamps are stored as fixed-width RFC 3339 text so they sort lexically
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::corrupt_row("timestamp", value, e))
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::corrupt_row("id", value, e))
}
