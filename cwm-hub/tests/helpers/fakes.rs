//! In-test collaborators

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cwm_common::db::{FrameRecord, Participant, Session, StateTransition, StudentReport};
use cwm_common::{Error, Result};
use cwm_hub::classifier::{AttentionClassifier, ClassifierError, ClassifierOutput, ClassifyRequest};
use cwm_hub::db::{SqliteStorage, Storage};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

type Script = Box<dyn Fn(usize, &ClassifyRequest) -> std::result::Result<String, ClassifierError> + Send + Sync>;

/// Classifier answering from a script instead of a model
pub struct FakeClassifier {
    script: Script,
    /// Delay for the n-th call (0-based)
    delay: Box<dyn Fn(usize) -> Duration + Send + Sync>,
    calls: AtomicUsize,
    students: Mutex<Vec<String>>,
}

impl FakeClassifier {
    pub fn scripted(
        script: impl Fn(usize, &ClassifyRequest) -> std::result::Result<String, ClassifierError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            delay: Box::new(|_| Duration::ZERO),
            calls: AtomicUsize::new(0),
            students: Mutex::new(Vec::new()),
        }
    }

    pub fn always(label: &'static str) -> Self {
        Self::scripted(move |_, _| Ok(label.to_string()))
    }

    /// Label chosen by student id
    pub fn per_student(labels: Vec<(&'static str, &'static str)>) -> Self {
        Self::scripted(move |_, request| {
            labels
                .iter()
                .find(|(student, _)| *student == request.student_id)
                .map(|(_, label)| label.to_string())
                .ok_or_else(|| ClassifierError::Parse(format!("no label for {}", request.student_id)))
        })
    }

    /// Labels in call order, repeating the last one
    pub fn sequence(labels: Vec<&'static str>) -> Self {
        Self::scripted(move |n, _| {
            Ok(labels
                .get(n)
                .or_else(|| labels.last())
                .copied()
                .unwrap_or("attentive")
                .to_string())
        })
    }

    pub fn failing() -> Self {
        Self::scripted(|_, _| Err(ClassifierError::Timeout))
    }

    pub fn with_delay(mut self, delay: impl Fn(usize) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Student ids in the order the classifier saw them
    pub fn students(&self) -> Vec<String> {
        self.students.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttentionClassifier for FakeClassifier {
    async fn classify(&self, request: ClassifyRequest) -> std::result::Result<ClassifierOutput, ClassifierError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.students.lock().unwrap().push(request.student_id.clone());

        let delay = (self.delay)(n);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let label = (self.script)(n, &request)?;
        ClassifierOutput::from_json(json!({
            "attentionLabel": label,
            "studentId": request.student_id,
            "attentionScore": if label == "attentive" { 0.9 } else { 0.1 },
        }))
    }
}

/// SQLite storage with switchable failures
pub struct FlakyStorage {
    inner: SqliteStorage,
    pub fail_frames: AtomicBool,
    pub fail_create: AtomicBool,
    pub end_affects_no_rows: AtomicBool,
}

impl FlakyStorage {
    pub fn new(inner: SqliteStorage) -> Self {
        Self {
            inner,
            fail_frames: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            end_affects_no_rows: AtomicBool::new(false),
        }
    }

    fn injected(what: &str) -> Error {
        Error::Database(sqlx::Error::Protocol(format!("injected {} failure", what)))
    }
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn create_session(&self, session: &Session) -> Result<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Self::injected("create_session"));
        }
        self.inner.create_session(session).await
    }

    async fn end_session(&self, session_id: Uuid, end_time: DateTime<Utc>) -> Result<bool> {
        if self.end_affects_no_rows.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.end_session(session_id, end_time).await
    }

    async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        self.inner.find_session(session_id).await
    }

    async fn record_frame(&self, frame: &FrameRecord) -> Result<()> {
        if self.fail_frames.load(Ordering::SeqCst) {
            return Err(Self::injected("record_frame"));
        }
        self.inner.record_frame(frame).await
    }

    async fn record_transition(&self, transition: &StateTransition) -> Result<()> {
        if self.fail_frames.load(Ordering::SeqCst) {
            return Err(Self::injected("record_transition"));
        }
        self.inner.record_transition(transition).await
    }

    async fn attention_report(&self, session_id: Uuid) -> Result<Vec<StudentReport>> {
        self.inner.attention_report(session_id).await
    }

    async fn list_participants(&self, session_id: Uuid) -> Result<Vec<Participant>> {
        self.inner.list_participants(session_id).await
    }
}
