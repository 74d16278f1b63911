//! Poll-style sessions: frames in over HTTP POST, results out over SSE
//!
//! Each poll session gets a worker task that owns the session state and a
//! bounded frame queue. The SSE stream takes the event receiver exactly once
//! and delivers events FIFO, emitting a named heartbeat whenever the queue is
//! idle for a heartbeat interval.

use crate::protocol::{FrameData, SessionEvent};
use crate::session::{scene_summary, Session};
use crate::state::{AppState, PollHandle, SessionEntry};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use dashmap::mapref::entry::Entry;
use futures_util::stream::{self, Stream};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Create a poll session and its worker task. Returns the frame submission
/// queue; the event side is parked in the registry for the SSE stream.
///
/// The registry entry is claimed atomically: if another task registered the
/// id first, no worker is spawned and `None` is returned.
pub fn spawn_poll_session(
    state: Arc<AppState>,
    session_id: String,
) -> Option<mpsc::Sender<FrameData>> {
    let capacity = state.config.queue_capacity;
    let (frame_tx, mut frame_rx) = mpsc::channel::<FrameData>(capacity);
    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(capacity);
    let token = Uuid::new_v4();

    match state.sessions.entry(session_id.clone()) {
        Entry::Occupied(_) => return None,
        Entry::Vacant(vacant) => {
            vacant.insert(SessionEntry::Poll(PollHandle {
                frames: frame_tx.clone(),
                events: Mutex::new(Some(event_rx)),
                token,
            }));
        }
    }
    info!(session = %session_id, "Poll session created");

    tokio::spawn(async move {
        let mut session = Session::new(session_id.clone(), &state.config);
        session.open();

        queue_event(&event_tx, SessionEvent::connected(session_id.clone()), &session_id);

        let idle = Duration::from_secs(state.config.session_idle_timeout_secs);
        loop {
            match timeout(idle, frame_rx.recv()).await {
                Ok(Some(frame)) => {
                    let event = session.process_frame(&frame.frame, &state).await;
                    if event_tx.is_closed() {
                        debug!(session = %session_id, "Event consumer gone");
                        break;
                    }
                    let description = match &event {
                        SessionEvent::Objects(result)
                            if !result.objects.is_empty() || !result.threats.is_empty() =>
                        {
                            let summary = scene_summary(result);
                            Some(state.narrator.describe_scene(&summary).await)
                        }
                        _ => None,
                    };
                    queue_event(&event_tx, event, &session_id);
                    if let Some(text) = description {
                        queue_event(&event_tx, SessionEvent::description(text), &session_id);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    debug!(session = %session_id, "Poll session idle timeout");
                    break;
                }
            }
        }

        session.close();
        // A replacement worker may have re-registered the id; only remove
        // the entry while it is still ours
        state.sessions.remove_if(&session_id, |_, entry| {
            matches!(entry, SessionEntry::Poll(handle) if handle.token == token)
        });
        info!(session = %session_id, "Poll session closed");
    });

    Some(frame_tx)
}

/// Non-blocking enqueue; a full queue drops the newest event so the worker
/// never stalls behind a slow or absent consumer.
fn queue_event(tx: &mpsc::Sender<SessionEvent>, event: SessionEvent, session_id: &str) {
    if let Err(e) = tx.try_send(event) {
        warn!(session = %session_id, error = %e, "Dropping event, queue full or closed");
    }
}

/// `GET /events/{session_id}`
pub async fn sse_handler(
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let receiver = {
        let entry = state.sessions.get(&session_id).ok_or(StatusCode::NOT_FOUND)?;
        match entry.value() {
            SessionEntry::Poll(handle) => handle.events.lock().take(),
            SessionEntry::Ws => return Err(StatusCode::CONFLICT),
        }
    };
    // A second subscriber for the same session gets a conflict
    let receiver = receiver.ok_or(StatusCode::CONFLICT)?;

    info!(session = %session_id, "SSE stream attached");
    let heartbeat = Duration::from_millis(state.config.heartbeat_ms);

    let stream = stream::unfold(receiver, move |mut rx| async move {
        match timeout(heartbeat, rx.recv()).await {
            Ok(Some(event)) => Some((Ok(to_sse_event(&event)), rx)),
            Ok(None) => None,
            Err(_) => Some((Ok(to_sse_event(&SessionEvent::heartbeat())), rx)),
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &SessionEvent) -> Event {
    Event::default()
        .event(event.event_name())
        .data(event.payload_json().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drishti_core::ServerConfig;
    use drishti_narrate::Narrator;

    fn test_state(config: ServerConfig) -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(config),
            None,
            Arc::new(Narrator::offline()),
        ))
    }

    #[tokio::test]
    async fn test_poll_session_id_is_claimed_once() {
        let state = test_state(ServerConfig::default());
        assert!(spawn_poll_session(state.clone(), "s1".to_string()).is_some());

        // A second creation for the same id loses the claim and spawns nothing
        assert!(spawn_poll_session(state.clone(), "s1".to_string()).is_none());
        assert_eq!(state.active_sessions(), 1);
    }

    #[tokio::test]
    async fn test_teardown_leaves_replacement_entry_alone() {
        let state = test_state(ServerConfig::default());
        let frames = spawn_poll_session(state.clone(), "s2".to_string()).unwrap();

        // A replacement handle takes over the id, dropping the first
        // worker's registered handle
        let (replacement_tx, _replacement_rx) = mpsc::channel::<FrameData>(4);
        state.sessions.insert(
            "s2".to_string(),
            SessionEntry::Poll(PollHandle {
                frames: replacement_tx,
                events: Mutex::new(None),
                token: Uuid::new_v4(),
            }),
        );

        // Closing the first worker's frame queue ends it; its teardown must
        // not remove the replacement's entry
        drop(frames);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(state.sessions.contains_key("s2"));
    }

    #[tokio::test]
    async fn test_idle_worker_removes_its_own_entry() {
        let mut config = ServerConfig::default();
        config.session_idle_timeout_secs = 0;
        let state = test_state(config);

        let _frames = spawn_poll_session(state.clone(), "s3".to_string()).unwrap();
        for _ in 0..100 {
            if state.active_sessions() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state.active_sessions(), 0);

        // The id is free to claim again
        assert!(spawn_poll_session(state.clone(), "s3".to_string()).is_some());
    }

    #[test]
    fn test_queue_event_drops_when_full() {
        let (tx, mut rx) = mpsc::channel::<SessionEvent>(1);
        queue_event(&tx, SessionEvent::heartbeat(), "s");
        queue_event(&tx, SessionEvent::error("overflow"), "s");

        // Only the first event survives
        let first = rx.try_recv().unwrap();
        assert_eq!(first.event_name(), "heartbeat");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sse_event_shape() {
        let event = SessionEvent::error("decode failed");
        // Event name matches the protocol tag
        assert_eq!(event.event_name(), "error");
        let payload = event.payload_json().unwrap();
        assert!(payload.contains("decode failed"));
    }
}
