//! HTTP surface

use crate::protocol::FrameData;
use crate::sse::{spawn_poll_session, sse_handler};
use crate::state::{AppState, SessionEntry};
use crate::ws::websocket_handler;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/events/:session_id", get(sse_handler))
        .route("/process-frame", post(process_frame_handler))
        .route("/status", get(status_handler))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

/// `POST /process-frame`: enqueue a frame for a poll session, creating the
/// session on first submission. Returns immediately; results are read from
/// the session's SSE stream.
async fn process_frame_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FrameData>,
) -> impl IntoResponse {
    let session_id = body
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let frames = loop {
        if let Some(entry) = state.sessions.get(&session_id) {
            match entry.value() {
                SessionEntry::Poll(handle) => break handle.frames.clone(),
                SessionEntry::Ws => {
                    return (
                        StatusCode::CONFLICT,
                        Json(json!({ "status": "error", "message": "session is socket-owned" })),
                    );
                }
            }
        }

        if state.at_capacity() {
            warn!("Rejecting new poll session, session limit reached");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "message": "session limit reached" })),
            );
        }

        if let Some(frames) = spawn_poll_session(state.clone(), session_id.clone()) {
            break frames;
        }
        // Another submission claimed the id first; retry against its entry
    };

    match frames.try_send(body) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "processing", "session_id": session_id })),
        ),
        Err(_) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "status": "busy", "session_id": session_id })),
        ),
    }
}

/// `GET /status`
async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "device": state.device(),
        "accelerator_requested": state.config.use_accelerator,
        "detector_loaded": state.detector.is_some(),
        "narrator_online": state.narrator.is_online(),
        "narration_provider": state.narrator.provider_name(),
        "active_sessions": state.active_sessions(),
    }))
}
