//! cwm-hub library - classroom attention monitoring hub
//!
//! Receives webcam frames from students, drops frames that look like the
//! previous one, classifies the rest, debounces the labels per student and
//! raises a class-wide alert when too many students are inattentive.

use axum::http::HeaderValue;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod alert;
pub mod api;
pub mod classifier;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod similarity;
pub mod stabilizer;

pub use error::{Error, Result};
pub use pipeline::FramePipeline;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<FramePipeline>,
    /// Origin allowed by CORS; any origin when None
    pub allowed_origin: Option<String>,
}

impl AppState {
    pub fn new(pipeline: Arc<FramePipeline>) -> Self {
        Self {
            pipeline,
            allowed_origin: None,
        }
    }

    pub fn with_allowed_origin(mut self, origin: Option<String>) -> Self {
        self.allowed_origin = origin;
        self
    }
}

fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let Some(origin) = allowed_origin else {
        return CorsLayer::permissive();
    };

    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::permissive().allow_origin(value),
        Err(e) => {
            warn!("Ignoring invalid allowed_origin '{}': {}", origin, e);
            CorsLayer::permissive()
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.allowed_origin.as_deref());

    Router::new()
        .merge(api::health_routes())
        .merge(api::frame_routes())
        .merge(api::session_routes())
        .route("/events", axum::routing::get(api::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
