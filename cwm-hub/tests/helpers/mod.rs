//! Test Helper Utilities
//!
//! Shared utilities for testing cwm-hub

#![allow(dead_code)]

pub mod fakes;
pub mod frames;

pub use fakes::{FakeClassifier, FlakyStorage};
pub use frames::{face_frame, noise_frame};

use cwm_common::config::HubConfig;
use cwm_common::db::init_memory_database;
use cwm_common::events::{EventBus, HubEvent};
use cwm_hub::classifier::AttentionClassifier;
use cwm_hub::db::{SqliteStorage, Storage};
use cwm_hub::pipeline::{FrameAnalysis, FrameOutcome, FrameSubmission};
use cwm_hub::session::SessionManager;
use cwm_hub::similarity::CenterCropLocator;
use cwm_hub::FramePipeline;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Defaults with a small fingerprint to keep tests fast
pub fn test_config() -> HubConfig {
    HubConfig {
        roi_size: 32,
        ..HubConfig::default()
    }
}

pub struct Harness {
    pub pipeline: Arc<FramePipeline>,
    pub classifier: Arc<FakeClassifier>,
    pub storage: Arc<FlakyStorage>,
}

pub async fn harness(classifier: FakeClassifier) -> Harness {
    harness_with(test_config(), classifier).await
}

pub async fn harness_with(config: HubConfig, classifier: FakeClassifier) -> Harness {
    let pool = init_memory_database().await.unwrap();
    let storage = Arc::new(FlakyStorage::new(SqliteStorage::new(pool)));
    let classifier = Arc::new(classifier);

    let sessions = Arc::new(SessionManager::new(
        Arc::clone(&storage) as Arc<dyn Storage>
    ));
    let pipeline = Arc::new(FramePipeline::from_config(
        &config,
        sessions,
        Arc::clone(&classifier) as Arc<dyn AttentionClassifier>,
        Arc::new(CenterCropLocator),
        EventBus::new(config.event_capacity),
    ));

    Harness {
        pipeline,
        classifier,
        storage,
    }
}

pub fn submission(session_id: Uuid, student_id: &str, frame: Vec<u8>) -> FrameSubmission {
    FrameSubmission {
        frame,
        student_id: Some(student_id.to_string()),
        student_name: Some(format!("Student {}", student_id)),
        session_id: Some(session_id.to_string()),
    }
}

pub fn expect_processed(outcome: FrameOutcome) -> FrameAnalysis {
    match outcome {
        FrameOutcome::Processed(analysis) => analysis,
        other => panic!("expected processed frame, got {:?}", other),
    }
}

/// Every event currently queued on `rx`
pub fn drain(rx: &mut broadcast::Receiver<HubEvent>) -> Vec<HubEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
