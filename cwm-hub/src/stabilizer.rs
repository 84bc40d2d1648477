//! Attention stabilizer
//!
//! Debounces the classifier's per-frame labels into a stable per-student
//! state. A label only becomes the stable state after `threshold`
//! consecutive frames agree on it, so single-frame misclassifications
//! never reach the dashboard.

use cwm_common::attention::{AttentionLabel, Stabilization, StableState};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Identifies one student within one session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StudentKey {
    pub session_id: Uuid,
    pub student_id: String,
}

impl StudentKey {
    pub fn new(session_id: Uuid, student_id: impl Into<String>) -> Self {
        Self {
            session_id,
            student_id: student_id.into(),
        }
    }
}

/// Debounce state for one student
///
/// `counter` counts consecutive raw labels equal to `pending_state` and is
/// always below the threshold between updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizationState {
    pub current_stable_state: StableState,
    pub pending_state: Option<AttentionLabel>,
    pub counter: u32,
}

impl StabilizationState {
    /// State after the very first label for a student
    fn first(label: AttentionLabel) -> Self {
        Self {
            current_stable_state: StableState::Unknown,
            pending_state: Some(label),
            counter: 1,
        }
    }

    fn snapshot(&self, should_update: bool) -> Stabilization {
        Stabilization {
            stable_state: self.current_stable_state,
            pending_state: self.pending_state,
            counter: self.counter,
            should_update,
        }
    }

    /// Apply one raw label; returns true when it promoted a new stable state
    pub fn apply(&mut self, label: AttentionLabel, threshold: u32) -> bool {
        if self.current_stable_state.matches(label) {
            self.pending_state = None;
            self.counter = 0;
            return false;
        }

        if self.pending_state == Some(label) {
            self.counter += 1;
        } else {
            self.pending_state = Some(label);
            self.counter = 1;
        }

        if self.counter >= threshold {
            self.current_stable_state = StableState::from(label);
            self.pending_state = None;
            self.counter = 0;
            return true;
        }

        false
    }
}

/// Per-(session, student) debounce state machines
pub struct AttentionStabilizer {
    states: Mutex<HashMap<StudentKey, StabilizationState>>,
    threshold: u32,
}

impl AttentionStabilizer {
    pub fn new(threshold: u32) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            threshold: threshold.max(1),
        }
    }

    /// Feed one raw label for a student
    ///
    /// The first label for a key only opens a pending run; it never
    /// promotes, whatever the threshold.
    pub async fn update(&self, key: &StudentKey, label: AttentionLabel) -> Stabilization {
        let mut states = self.states.lock().await;

        let Some(state) = states.get_mut(key) else {
            let state = StabilizationState::first(label);
            states.insert(key.clone(), state);
            return state.snapshot(false);
        };

        let promoted = state.apply(label, self.threshold);
        state.snapshot(promoted)
    }

    /// Stable state for a student, `Unknown` if never seen
    pub async fn stable_state(&self, key: &StudentKey) -> StableState {
        self.states
            .lock()
            .await
            .get(key)
            .map(|s| s.current_stable_state)
            .unwrap_or_default()
    }

    pub async fn state(&self, key: &StudentKey) -> Option<StabilizationState> {
        self.states.lock().await.get(key).copied()
    }

    /// Drop every student of a session; returns how many were removed
    pub async fn evict_session(&self, session_id: Uuid) -> usize {
        let mut states = self.states.lock().await;
        let before = states.len();
        states.retain(|key, _| key.session_id != session_id);
        before - states.len()
    }

    pub async fn remove(&self, key: &StudentKey) {
        self.states.lock().await.remove(key);
    }

    pub async fn tracked(&self) -> usize {
        self.states.lock().await.len()
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
