//! Process-wide shared state
//!
//! The detector, narrator and config are initialized once at startup and read
//! only from then on. The session registry is the single piece of mutable
//! process state; entries are added on connect and removed on teardown.

use crate::protocol::{FrameData, SessionEvent};
use dashmap::DashMap;
use drishti_core::ServerConfig;
use drishti_narrate::Narrator;
use drishti_vision::Detector;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub detector: Option<Arc<dyn Detector>>,
    pub narrator: Arc<Narrator>,
    pub sessions: DashMap<String, SessionEntry>,
}

impl AppState {
    pub fn new(
        config: Arc<ServerConfig>,
        detector: Option<Arc<dyn Detector>>,
        narrator: Arc<Narrator>,
    ) -> Self {
        Self {
            config,
            detector,
            narrator,
            sessions: DashMap::new(),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn at_capacity(&self) -> bool {
        self.sessions.len() >= self.config.max_sessions
    }

    pub fn device(&self) -> &'static str {
        self.detector.as_ref().map(|d| d.device()).unwrap_or("none")
    }
}

/// Registry entry per live session.
pub enum SessionEntry {
    /// Socket-owned session; the connection task holds all state.
    Ws,
    /// Poll-style session fed by `POST /process-frame` and drained over SSE.
    Poll(PollHandle),
}

pub struct PollHandle {
    pub frames: mpsc::Sender<FrameData>,
    /// Taken exactly once by the SSE stream for this session.
    pub events: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
    /// Identifies the worker that owns this entry; teardown only removes the
    /// entry while the token still matches.
    pub token: Uuid,
}
