//! Frame pipeline
//!
//! Runs one submitted frame through the session gate, the similarity gate,
//! the classifier, the stabilizer and the alert latch, then records and
//! broadcasts the result. All state lives in the `FramePipeline` context
//! object; there is no process-wide state.
//!
//! Frames of the same (session, student) are processed one at a time in
//! arrival order. Different students run in parallel.

pub mod locks;
pub mod roster;

use chrono::{DateTime, Utc};
use cwm_common::attention::{AttentionLabel, Stabilization, StableState};
use cwm_common::config::HubConfig;
use cwm_common::db::{FrameRecord, Participant, Session, StateTransition};
use cwm_common::events::{EventBus, HubEvent};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::{AttentionClassifier, ClassifyRequest};
use crate::error::{Error, MissingField, Result};
use crate::session::{SessionManager, SessionReport};
use crate::similarity::{RegionLocator, SimilarityGate};
use crate::stabilizer::{AttentionStabilizer, StudentKey};

use locks::KeyedLocks;
use roster::{Rosters, StudentLabels};

/// One frame as submitted by a client
#[derive(Debug, Clone, Default)]
pub struct FrameSubmission {
    pub frame: Vec<u8>,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub session_id: Option<String>,
}

/// Frame that went through classification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameAnalysis {
    pub session_id: Uuid,
    pub student_id: String,
    pub timestamp: DateTime<Utc>,
    pub is_first_frame: bool,
    pub similarity_score: Option<f64>,
    pub raw_label: AttentionLabel,
    /// Debounced state after this frame
    pub label: StableState,
    pub alert: bool,
    /// Classifier response as received
    pub analysis: serde_json::Value,
    pub stabilization: Stabilization,
    /// Observers were not notified because the session ended mid-flight
    pub broadcast_suppressed: bool,
}

/// Frame dropped because it looked like the previous one
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFrame {
    pub session_id: Uuid,
    pub student_id: String,
    pub timestamp: DateTime<Utc>,
    pub similarity_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum FrameOutcome {
    Skipped(SkippedFrame),
    Processed(FrameAnalysis),
}

/// A participant with their current labels
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStatus {
    #[serde(flatten)]
    pub participant: Participant,
    #[serde(flatten)]
    pub labels: StudentLabels,
}

struct ValidSubmission {
    frame: Vec<u8>,
    student_id: String,
    student_name: Option<String>,
    session_id: String,
}

impl FrameSubmission {
    fn validate(self) -> Result<ValidSubmission> {
        fn present(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        if self.frame.is_empty() {
            return Err(Error::BadRequest(MissingField::Frame));
        }
        let student_id =
            present(self.student_id).ok_or(Error::BadRequest(MissingField::StudentId))?;
        let session_id =
            present(self.session_id).ok_or(Error::BadRequest(MissingField::SessionId))?;

        Ok(ValidSubmission {
            frame: self.frame,
            student_id,
            student_name: present(self.student_name),
            session_id,
        })
    }
}

/// Similarity cache key for one student within one session
fn client_id(session_id: Uuid, student_id: &str) -> String {
    format!("{}{}", client_prefix(session_id), student_id)
}

/// Shared prefix of every similarity cache key in a session
fn client_prefix(session_id: Uuid) -> String {
    format!("{}:", session_id)
}

/// Owns all per-frame processing state
pub struct FramePipeline {
    sessions: Arc<SessionManager>,
    gate: SimilarityGate,
    classifier: Arc<dyn AttentionClassifier>,
    stabilizer: AttentionStabilizer,
    rosters: Rosters,
    locks: KeyedLocks<StudentKey>,
    events: EventBus,
}

impl FramePipeline {
    pub fn new(
        sessions: Arc<SessionManager>,
        gate: SimilarityGate,
        classifier: Arc<dyn AttentionClassifier>,
        stabilizer: AttentionStabilizer,
        alert_threshold: f64,
        events: EventBus,
    ) -> Self {
        Self {
            sessions,
            gate,
            classifier,
            stabilizer,
            rosters: Rosters::new(alert_threshold),
            locks: KeyedLocks::new(),
            events,
        }
    }

    /// Build a pipeline from hub configuration
    pub fn from_config(
        config: &HubConfig,
        sessions: Arc<SessionManager>,
        classifier: Arc<dyn AttentionClassifier>,
        locator: Arc<dyn RegionLocator>,
        events: EventBus,
    ) -> Self {
        Self::new(
            sessions,
            SimilarityGate::from_config(config, locator),
            classifier,
            AttentionStabilizer::new(config.frame_threshold),
            config.alert_threshold,
            events,
        )
    }

    /// Process one submitted frame
    ///
    /// Rejections (missing input, inactive session, undecodable frame,
    /// classifier failure) leave the stabilizer, the label indices and
    /// storage untouched. Storage failures after classification are logged
    /// and do not fail the frame.
    pub async fn submit_frame(&self, submission: FrameSubmission) -> Result<FrameOutcome> {
        let submission = submission.validate()?;

        let session_id = Uuid::parse_str(&submission.session_id)
            .map_err(|_| Error::SessionInactive(submission.session_id.clone()))?;
        if !self.sessions.is_active(session_id).await {
            debug!(session_id = %session_id, student_id = %submission.student_id, "Rejected frame for inactive session");
            return Err(Error::SessionInactive(session_id.to_string()));
        }

        let key = StudentKey::new(session_id, submission.student_id.clone());
        let _guard = self.locks.acquire(key.clone()).await;
        let timestamp = Utc::now();

        let decision = self
            .gate
            .evaluate(&client_id(session_id, &key.student_id), &submission.frame)
            .await?;

        if !decision.should_analyze() {
            debug!(
                session_id = %session_id,
                student_id = %key.student_id,
                similarity = ?decision.similarity_score,
                "Skipped frame similar to previous"
            );
            return Ok(FrameOutcome::Skipped(SkippedFrame {
                session_id,
                student_id: key.student_id,
                timestamp,
                similarity_score: decision.similarity_score,
            }));
        }

        let request = ClassifyRequest::new(&key.student_id, submission.frame, timestamp);
        let output = self.classifier.classify(request).await.map_err(|e| {
            warn!(session_id = %session_id, student_id = %key.student_id, "Classifier failed: {}", e);
            Error::Classifier(e)
        })?;
        let raw_label: AttentionLabel = output.attention_label.parse()?;

        let stabilization = self.stabilizer.update(&key, raw_label).await;
        let promoted_to = stabilization
            .should_update
            .then_some(stabilization.stable_state);
        let roster = self
            .rosters
            .apply(session_id, &key.student_id, promoted_to, raw_label)
            .await;

        if let Some(to) = promoted_to {
            info!(
                session_id = %session_id,
                student_id = %key.student_id,
                from = %roster.previous_stable,
                to = %to,
                "Stable attention state changed"
            );
            self.record_transition(StateTransition {
                session_id,
                student_id: key.student_id.clone(),
                from_state: roster.previous_stable,
                to_state: to,
                at: timestamp,
            })
            .await;
        }

        if roster.alert {
            info!(
                session_id = %session_id,
                ratio = roster.inattentive_ratio,
                tracked = roster.tracked_students,
                "Class attention alert"
            );
        }

        self.record_frame(FrameRecord {
            id: Uuid::new_v4(),
            session_id,
            student_id: key.student_id.clone(),
            student_name: submission.student_name.clone(),
            timestamp,
            similarity_score: decision.similarity_score,
            stable_label: stabilization.stable_state,
            raw_label,
        })
        .await;

        let broadcast_suppressed = !self.sessions.is_active(session_id).await;
        if broadcast_suppressed {
            warn!(session_id = %session_id, student_id = %key.student_id, "Session ended during processing, broadcast suppressed");
            self.forget_student(&key).await;
        } else {
            if let Some(to) = promoted_to {
                self.events.emit_lossy(HubEvent::StableStateChanged {
                    session_id,
                    student_id: key.student_id.clone(),
                    from: roster.previous_stable,
                    to,
                    timestamp,
                });
            }
            self.events.emit_lossy(HubEvent::AttentionUpdate {
                session_id,
                student_id: key.student_id.clone(),
                student_name: submission.student_name,
                alert: roster.alert,
                label: stabilization.stable_state,
                raw_label,
                analysis: output.raw.clone(),
                stabilization,
                timestamp,
            });
            if roster.alert {
                self.events.emit_lossy(HubEvent::ClassAlert {
                    session_id,
                    inattentive_ratio: roster.inattentive_ratio,
                    tracked_students: roster.tracked_students,
                    timestamp,
                });
            }
        }

        debug!(
            session_id = %session_id,
            student_id = %key.student_id,
            raw = %raw_label,
            stable = %stabilization.stable_state,
            counter = stabilization.counter,
            "Processed frame"
        );

        Ok(FrameOutcome::Processed(FrameAnalysis {
            session_id,
            student_id: key.student_id,
            timestamp,
            is_first_frame: decision.is_first_frame,
            similarity_score: decision.similarity_score,
            raw_label,
            label: stabilization.stable_state,
            alert: roster.alert,
            analysis: output.raw,
            stabilization,
            broadcast_suppressed,
        }))
    }

    async fn record_transition(&self, transition: StateTransition) {
        if let Err(e) = self.sessions.storage().record_transition(&transition).await {
            warn!(
                session_id = %transition.session_id,
                student_id = %transition.student_id,
                "Failed to record state transition: {}",
                e
            );
        }
    }

    async fn record_frame(&self, frame: FrameRecord) {
        if let Err(e) = self.sessions.storage().record_frame(&frame).await {
            warn!(
                session_id = %frame.session_id,
                student_id = %frame.student_id,
                "Failed to record frame: {}",
                e
            );
        }
    }

    /// Drop state an in-flight frame recreated after its session ended
    async fn forget_student(&self, key: &StudentKey) {
        self.stabilizer.remove(key).await;
        self.rosters.remove(key.session_id).await;
        self.gate
            .cache()
            .remove(&client_id(key.session_id, &key.student_id))
            .await;
        self.locks.remove(key).await;
    }

    pub async fn start_session(&self, class_id: Option<String>) -> Result<Session> {
        let session = self.sessions.start_session(class_id).await?;
        self.events.emit_lossy(HubEvent::SessionStarted {
            session_id: session.id,
            class_id: session.class_id.clone(),
            timestamp: session.start_time,
        });
        Ok(session)
    }

    /// End a session and evict its per-student state
    ///
    /// State is evicted whenever the session was marked ended in memory,
    /// including when storage then failed to record the end.
    pub async fn end_session(&self, session_id: Uuid) -> Result<Session> {
        let result = self.sessions.end_session(session_id).await;
        if matches!(result, Ok(_) | Err(Error::Persistence(_))) {
            self.evict_session(session_id).await;
        }

        let session = result?;
        self.events.emit_lossy(HubEvent::SessionEnded {
            session_id,
            timestamp: session.end_time.unwrap_or_else(Utc::now),
        });
        Ok(session)
    }

    async fn evict_session(&self, session_id: Uuid) {
        let evicted = self.stabilizer.evict_session(session_id).await;
        self.rosters.remove(session_id).await;
        // Students whose frames never got past the classifier have a cached
        // fingerprint but no roster entry
        let fingerprints = self
            .gate
            .cache()
            .remove_prefixed(&client_prefix(session_id))
            .await;
        self.locks
            .remove_where(|key| key.session_id == session_id)
            .await;
        debug!(
            session_id = %session_id,
            students = evicted,
            fingerprints,
            "Evicted session state"
        );
    }

    /// Report for the given session, or for the current one when omitted
    pub async fn report(&self, session_id: Option<Uuid>) -> Result<SessionReport> {
        let session_id = match session_id {
            Some(id) => id,
            None => {
                self.sessions
                    .current_session()
                    .await
                    .ok_or_else(|| Error::SessionNotFound("no active session".to_string()))?
                    .id
            }
        };
        self.sessions.generate_report(session_id).await
    }

    /// Participants of a session with their current labels
    pub async fn session_students(&self, session_id: Uuid) -> Result<Vec<StudentStatus>> {
        self.sessions.find_session(session_id).await?;
        let participants = self
            .sessions
            .storage()
            .list_participants(session_id)
            .await?;

        let mut students = Vec::with_capacity(participants.len());
        for participant in participants {
            let labels = self
                .rosters
                .labels(session_id, &participant.student_id)
                .await
                .unwrap_or(StudentLabels {
                    stable_label: StableState::Unknown,
                    raw_label: None,
                });
            students.push(StudentStatus {
                participant,
                labels,
            });
        }
        Ok(students)
    }

    pub async fn stable_state(&self, session_id: Uuid, student_id: &str) -> StableState {
        self.stabilizer
            .stable_state(&StudentKey::new(session_id, student_id))
            .await
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn gate(&self) -> &SimilarityGate {
        &self.gate
    }

    pub fn stabilizer(&self) -> &AttentionStabilizer {
        &self.stabilizer
    }
}
