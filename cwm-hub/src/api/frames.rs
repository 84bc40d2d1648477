//! Frame submission endpoint
//!
//! The frame is the raw request body. Student and session identity come
//! from the query string, with `x-student-id`, `x-student-name` and
//! `x-session-id` headers as fallbacks.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pipeline::{FrameOutcome, FrameSubmission};
use crate::AppState;

/// Largest accepted frame
pub const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameQuery {
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FrameResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: FrameOutcome,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// POST /api/frames
pub async fn submit_frame(
    State(state): State<AppState>,
    Query(query): Query<FrameQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FrameResponse>> {
    let submission = FrameSubmission {
        frame: body.to_vec(),
        student_id: query.student_id.or_else(|| header(&headers, "x-student-id")),
        student_name: query
            .student_name
            .or_else(|| header(&headers, "x-student-name")),
        session_id: query.session_id.or_else(|| header(&headers, "x-session-id")),
    };

    let outcome = state.pipeline.submit_frame(submission).await?;
    Ok(Json(FrameResponse {
        success: true,
        outcome,
    }))
}

pub fn frame_routes() -> Router<AppState> {
    Router::new()
        .route("/api/frames", post(submit_frame))
        .layer(DefaultBodyLimit::max(MAX_FRAME_BYTES))
}
