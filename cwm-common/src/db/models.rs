//! Database models

use crate::attention::{AttentionLabel, StableState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bounded monitoring interval (class period)
///
/// `active` flips to false exactly once, when `end_time` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub class_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub active: bool,
}

impl Session {
    /// New active session starting now
    pub fn start(class_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            class_id,
            start_time: Utc::now(),
            end_time: None,
            active: true,
        }
    }
}

/// One analyzed frame, written once and never updated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: String,
    pub student_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// None for the first frame seen from a client
    pub similarity_score: Option<f64>,
    pub stable_label: StableState,
    pub raw_label: AttentionLabel,
}

/// A promotion of a student's debounced state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    pub session_id: Uuid,
    pub student_id: String,
    pub from_state: StableState,
    pub to_state: StableState,
    pub at: DateTime<Utc>,
}

/// Per-student attention summary for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student_id: String,
    pub name: String,
    pub total_frames: i64,
    pub attentive_frames: i64,
    pub attention_percentage: f64,
}

/// A student who submitted at least one analyzed frame in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub student_id: String,
    pub name: Option<String>,
    pub joined_at: DateTime<Utc>,
}
