//! Per-session label indices and alert latch
//!
//! Each session keeps two separate indices: the latest raw classifier
//! label per student, which drives the class-wide alert, and the latest
//! stable (debounced) state per student, which the dashboard shows.

use cwm_common::attention::{AttentionLabel, StableState};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::alert::{inattentive_ratio, AlertAggregator};

/// Result of recording one frame's labels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RosterUpdate {
    /// Stable state before this frame
    pub previous_stable: StableState,
    /// Rising edge of a low-attention episode
    pub alert: bool,
    pub inattentive_ratio: f64,
    pub tracked_students: usize,
}

/// Current labels of one student
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentLabels {
    pub stable_label: StableState,
    pub raw_label: Option<AttentionLabel>,
}

pub struct ClassRoster {
    raw_labels: HashMap<String, AttentionLabel>,
    stable_labels: HashMap<String, StableState>,
    alert: AlertAggregator,
}

impl ClassRoster {
    pub fn new(alert_threshold: f64) -> Self {
        Self {
            raw_labels: HashMap::new(),
            stable_labels: HashMap::new(),
            alert: AlertAggregator::new(alert_threshold),
        }
    }

    /// Apply one frame: an optional promotion, then the raw label
    ///
    /// A promotion re-arms the alert latch before the alert is computed.
    pub fn apply(
        &mut self,
        student_id: &str,
        promoted_to: Option<StableState>,
        raw_label: AttentionLabel,
    ) -> RosterUpdate {
        let previous_stable = self.stable_label(student_id);

        if let Some(state) = promoted_to {
            self.stable_labels.insert(student_id.to_string(), state);
            self.alert.reset();
        }

        self.raw_labels.insert(student_id.to_string(), raw_label);
        let alert = self.alert.compute_alert_flag(self.raw_labels.values());

        RosterUpdate {
            previous_stable,
            alert,
            inattentive_ratio: inattentive_ratio(self.raw_labels.values()).unwrap_or(0.0),
            tracked_students: self.raw_labels.len(),
        }
    }

    pub fn stable_label(&self, student_id: &str) -> StableState {
        self.stable_labels.get(student_id).copied().unwrap_or_default()
    }

    pub fn labels(&self, student_id: &str) -> StudentLabels {
        StudentLabels {
            stable_label: self.stable_label(student_id),
            raw_label: self.raw_labels.get(student_id).copied(),
        }
    }

    // Students with at least one analyzed frame
}

/// Rosters of all live sessions
pub struct Rosters {
    rosters: Mutex<HashMap<Uuid, ClassRoster>>,
    alert_threshold: f64,
}

impl Rosters {
    pub fn new(alert_threshold: f64) -> Self {
        Self {
            rosters: Mutex::new(HashMap::new()),
            alert_threshold,
        }
    }

    pub async fn apply(
        &self,
        session_id: Uuid,
        student_id: &str,
        promoted_to: Option<StableState>,
        raw_label: AttentionLabel,
    ) -> RosterUpdate {
        self.rosters
            .lock()
            .await
            .entry(session_id)
            .or_insert_with(|| ClassRoster::new(self.alert_threshold))
            .apply(student_id, promoted_to, raw_label)
    }

    pub async fn labels(&self, session_id: Uuid, student_id: &str) -> Option<StudentLabels> {
        self.rosters
            .lock()
            .await
            .get(&session_id)
            .map(|roster| roster.labels(student_id))
    }

    /// Returns whether the session had a roster
    pub async fn remove(&self, session_id: Uuid) -> bool {
        self.rosters.lock().await.remove(&session_id).is_some()
    }
}
