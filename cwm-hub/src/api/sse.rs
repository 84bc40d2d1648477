//! Server-Sent Events for dashboard observers

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events - every hub event, as it happens
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    cwm_common::sse::create_event_sse_stream(state.pipeline.events(), "cwm-hub")
}
