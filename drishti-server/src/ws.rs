//! WebSocket transport
//!
//! One connection, one session. Frames arrive as text messages, either a bare
//! base64 data URL or the JSON `FrameData` shape; results go back in arrival
//! order over an outbound channel drained by a dedicated send task.

use crate::protocol::{FrameData, SessionEvent};
use crate::session::Session;
use crate::state::{AppState, SessionEntry};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = Uuid::new_v4().to_string();

    if state.at_capacity() {
        warn!(session = %session_id, "Rejecting connection, session limit reached");
        let mut socket = socket;
        let _ = socket
            .send(Message::Text(
                SessionEvent::error("session limit reached")
                    .to_json()
                    .unwrap_or_default(),
            ))
            .await;
        return;
    }

    info!(session = %session_id, "WebSocket connection established");
    state.sessions.insert(session_id.clone(), SessionEntry::Ws);

    let (tx, mut rx) = mpsc::channel::<SessionEvent>(state.config.queue_capacity);
    let (mut sender, mut receiver) = socket.split();

    // Drain outbound events to the socket in FIFO order
    let send_session = session_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match event.to_json() {
                Ok(json) => json,
                Err(e) => {
                    warn!(session = %send_session, error = %e, "Failed to serialize event");
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(json)).await {
                debug!(session = %send_session, error = %e, "Socket send failed");
                break;
            }
        }
    });

    let mut session = Session::new(session_id.clone(), &state.config);
    session.open();

    if tx
        .send(SessionEvent::connected(session_id.clone()))
        .await
        .is_err()
    {
        session.close();
        state.sessions.remove(&session_id);
        return;
    }

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let event = session.process_frame(&frame_payload(&text), &state).await;
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                debug!(session = %session_id, "Ignoring binary message");
            }
            Ok(Message::Close(_)) => {
                debug!(session = %session_id, "Closed by client");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                warn!(session = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    session.begin_close();
    drop(tx);
    let _ = send_task.await;
    session.close();
    state.sessions.remove(&session_id);
    info!(session = %session_id, "WebSocket session closed");
}

/// Accept either the JSON submission shape or a bare data-URL string.
fn frame_payload(text: &str) -> std::borrow::Cow<'_, str> {
    if text.trim_start().starts_with('{') {
        if let Ok(data) = serde_json::from_str::<FrameData>(text) {
            return std::borrow::Cow::Owned(data.frame);
        }
    }
    std::borrow::Cow::Borrowed(text)
}
