//! Event types for the ClassWatch event system
//!
//! Provides the hub event definitions and the EventBus that fans them out
//! to dashboard observers.

use crate::attention::{AttentionLabel, Stabilization, StableState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Hub event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// Delivery is best-effort: no acknowledgment, no replay for late subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum HubEvent {
    /// A monitoring session was started
    SessionStarted {
        session_id: Uuid,
        class_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A monitoring session was ended; no further frames are admitted
    SessionEnded {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A frame was analyzed for a student
    ///
    /// Emitted once per processed (non-skipped) frame.
    AttentionUpdate {
        session_id: Uuid,
        student_id: String,
        student_name: Option<String>,
        /// Class-wide low-attention alert (edge-triggered)
        alert: bool,
        /// Debounced label shown on the dashboard
        label: StableState,
        /// Raw label from this frame
        raw_label: AttentionLabel,
        /// Classifier response as received
        analysis: serde_json::Value,
        stabilization: Stabilization,
        timestamp: DateTime<Utc>,
    },

    /// A student's debounced state changed
    StableStateChanged {
        session_id: Uuid,
        student_id: String,
        from: StableState,
        to: StableState,
        timestamp: DateTime<Utc>,
    },

    /// The inattentive share of the class crossed the alert threshold
    ClassAlert {
        session_id: Uuid,
        inattentive_ratio: f64,
        tracked_students: usize,
        timestamp: DateTime<Utc>,
    },
}

impl HubEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            HubEvent::SessionStarted { .. } => "SessionStarted",
            HubEvent::SessionEnded { .. } => "SessionEnded",
            HubEvent::AttentionUpdate { .. } => "AttentionUpdate",
            HubEvent::StableStateChanged { .. } => "StableStateChanged",
            HubEvent::ClassAlert { .. } => "ClassAlert",
        }
    }
}

/// Publish-only fan-out of hub events to every connected observer
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HubEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow observers that fall more than `capacity` events behind lose
    /// the oldest events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: HubEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
