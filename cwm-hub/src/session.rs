//! Session lifecycle
//!
//! Sessions move `active → ended` exactly once. The in-memory index is the
//! admission gate for frames; storage is the durable record.

use chrono::Utc;
use cwm_common::db::{Session, StudentReport};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

use crate::db::Storage;
use crate::error::{Error, Result};

/// Report for one session
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session_id: Uuid,
    pub active: bool,
    pub students: Vec<StudentReport>,
}

/// Owns the active-session index
pub struct SessionManager {
    storage: Arc<dyn Storage>,
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Persist and register a new active session
    ///
    /// The session is only admitted in memory once storage accepted it.
    pub async fn start_session(&self, class_id: Option<String>) -> Result<Session> {
        let session = Session::start(class_id);

        self.storage.create_session(&session).await.map_err(|e| {
            error!(session_id = %session.id, "Failed to persist new session: {}", e);
            Error::Persistence(format!("cannot create session: {}", e))
        })?;

        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());

        info!(session_id = %session.id, class_id = ?session.class_id, "Session started");
        Ok(session)
    }

    /// End an active session
    ///
    /// The in-memory record is marked ended before storage is updated and
    /// stays ended even when the storage update affects no row.
    pub async fn end_session(&self, session_id: Uuid) -> Result<Session> {
        let ended = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .get_mut(&session_id)
                .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

            if !session.active {
                return Err(Error::AlreadyEnded(session_id.to_string()));
            }

            session.active = false;
            session.end_time = Some(Utc::now());
            session.clone()
        };

        let end_time = ended.end_time.unwrap_or_else(Utc::now);
        match self.storage.end_session(session_id, end_time).await {
            Ok(true) => {
                info!(session_id = %session_id, "Session ended");
                Ok(ended)
            }
            Ok(false) => {
                error!(session_id = %session_id, "Session end updated no rows");
                Err(Error::Persistence(format!(
                    "session {} was not updated in storage",
                    session_id
                )))
            }
            Err(e) => {
                error!(session_id = %session_id, "Failed to persist session end: {}", e);
                Err(Error::Persistence(format!("cannot end session: {}", e)))
            }
        }
    }

    /// The session if it exists and is active
    pub async fn get_active_session(&self, session_id: Uuid) -> Option<Session> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .filter(|s| s.active)
            .cloned()
    }

    pub async fn is_active(&self, session_id: Uuid) -> bool {
        self.get_active_session(session_id).await.is_some()
    }

    /// Most recently started active session
    pub async fn current_session(&self) -> Option<Session> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.active)
            .max_by_key(|s| s.start_time)
            .cloned()
    }

    /// Session from memory, falling back to storage
    pub async fn find_session(&self, session_id: Uuid) -> Result<Session> {
        if let Some(session) = self.sessions.read().await.get(&session_id) {
            return Ok(session.clone());
        }

        self.storage
            .find_session(session_id)
            .await?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    /// Per-student attention report for a known session
    pub async fn generate_report(&self, session_id: Uuid) -> Result<SessionReport> {
        let session = self.find_session(session_id).await?;
        let students = self.storage.attention_report(session_id).await?;

        Ok(SessionReport {
            session_id,
            active: session.active,
            students,
        })
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}
