//! Session control endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::pipeline::StudentStatus;
use crate::session::SessionReport;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub class_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub class_id: Option<String>,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: SessionReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentsResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub students: Vec<StudentStatus>,
}

/// Unparseable ids cannot name an existing session
fn parse_session_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| Error::SessionNotFound(raw.to_string()))
}

/// POST /api/sessions/start
///
/// The body is optional; a missing or unparseable body starts a session
/// without a class id.
pub async fn start_session(
    State(state): State<AppState>,
    body: Option<Json<StartSessionRequest>>,
) -> Result<Json<StartSessionResponse>> {
    let class_id = body.and_then(|Json(req)| req.class_id);
    let session = state.pipeline.start_session(class_id).await?;

    Ok(Json(StartSessionResponse {
        success: true,
        session_id: session.id,
        class_id: session.class_id,
        start_time: session.start_time,
    }))
}

/// POST /api/sessions/end
pub async fn end_session(
    State(state): State<AppState>,
    body: std::result::Result<Json<EndSessionRequest>, JsonRejection>,
) -> Result<Json<EndSessionResponse>> {
    let Json(req) = body.map_err(|e| Error::MalformedBody(e.body_text()))?;
    let session_id = parse_session_id(&req.session_id)?;
    let session = state.pipeline.end_session(session_id).await?;

    Ok(Json(EndSessionResponse {
        success: true,
        session_id,
        end_time: session.end_time,
    }))
}

/// GET /api/sessions/report
///
/// Without `sessionId`, reports on the most recently started active session.
pub async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportResponse>> {
    let session_id = query
        .session_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_session_id)
        .transpose()?;

    let report = state.pipeline.report(session_id).await?;
    Ok(Json(ReportResponse {
        success: true,
        report,
    }))
}

/// GET /api/sessions/:id/students
pub async fn get_students(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StudentsResponse>> {
    let session_id = parse_session_id(&id)?;
    let students = state.pipeline.session_students(session_id).await?;

    Ok(Json(StudentsResponse {
        success: true,
        session_id,
        students,
    }))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions/start", post(start_session))
        .route("/api/sessions/end", post(end_session))
        .route("/api/sessions/report", get(get_report))
        .route("/api/sessions/:id/students", get(get_students))
}
