//! Configuration for the Drishti server
//!
//! Everything is environment-driven with sensible defaults so the server runs
//! out of the box. The narration credential (`GROQ_API_KEY`) is read separately
//! by drishti-narrate and never stored here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Multi-object tracker tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Frames a track survives without a matching detection before eviction
    pub max_age: u32,
    /// Consecutive matched frames before a track is confirmed and reported
    pub n_init: u32,
    /// Minimum IoU for associating a detection with an existing track
    pub iou_threshold: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 10,
            n_init: 3,
            iou_threshold: 0.3,
        }
    }
}

/// Threat classification tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatConfig {
    /// Objects at or beyond this estimated distance are never threats
    pub distance_ceiling: f32,
    /// Below this estimated distance a threat escalates to "high" severity
    pub high_severity_distance: f32,
    /// Seconds of the rolling per-track alert cooldown window
    pub alert_cooldown_secs: u64,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            distance_ceiling: 10.0,
            high_severity_distance: 3.0,
            alert_cooldown_secs: 30,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. "0.0.0.0:8000"
    pub bind_addr: String,
    /// Path to the ONNX detection model weights
    pub model_path: PathBuf,
    /// Prefer the GPU execution provider when available
    pub use_accelerator: bool,
    /// Detector confidence threshold
    pub confidence_threshold: f32,
    /// Tracker tuning
    pub tracker: TrackerConfig,
    /// Threat classification tuning
    pub threat: ThreatConfig,
    /// Heartbeat cadence for idle event-stream sessions, in milliseconds
    pub heartbeat_ms: u64,
    /// Per-session outbound queue depth
    pub queue_capacity: usize,
    /// Maximum concurrently registered sessions
    pub max_sessions: usize,
    /// Seconds an idle poll session survives before teardown
    pub session_idle_timeout_secs: u64,
    /// Narration request budget, in seconds
    pub narration_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            model_path: PathBuf::from("./models/yolov8n.onnx"),
            use_accelerator: false,
            confidence_threshold: 0.5,
            tracker: TrackerConfig::default(),
            threat: ThreatConfig::default(),
            heartbeat_ms: 300,
            queue_capacity: 64,
            max_sessions: 256,
            session_idle_timeout_secs: 300,
            narration_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    /// Build configuration from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("DRISHTI_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(path) = std::env::var("DRISHTI_MODEL_PATH") {
            config.model_path = PathBuf::from(path);
        }
        if let Ok(v) = std::env::var("DRISHTI_USE_ACCELERATOR") {
            config.use_accelerator = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = env_parse::<f32>("DRISHTI_CONFIDENCE_THRESHOLD") {
            config.confidence_threshold = v;
        }
        if let Some(v) = env_parse::<u32>("DRISHTI_TRACKER_MAX_AGE") {
            config.tracker.max_age = v;
        }
        if let Some(v) = env_parse::<u32>("DRISHTI_TRACKER_N_INIT") {
            config.tracker.n_init = v;
        }
        if let Some(v) = env_parse::<u64>("DRISHTI_ALERT_COOLDOWN_SECS") {
            config.threat.alert_cooldown_secs = v;
        }
        if let Some(v) = env_parse::<u64>("DRISHTI_HEARTBEAT_MS") {
            config.heartbeat_ms = v;
        }
        if let Some(v) = env_parse::<usize>("DRISHTI_MAX_SESSIONS") {
            config.max_sessions = v;
        }

        config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", self.bind_addr));
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err("Confidence threshold must be within [0, 1]".to_string());
        }

        if self.tracker.max_age == 0 {
            return Err("Tracker max_age must be at least 1".to_string());
        }

        if self.tracker.n_init == 0 {
            return Err("Tracker n_init must be at least 1".to_string());
        }

        if !(0.0..=1.0).contains(&self.tracker.iou_threshold) {
            return Err("IoU threshold must be within [0, 1]".to_string());
        }

        if self.threat.high_severity_distance > self.threat.distance_ceiling {
            return Err("High-severity distance cannot exceed the distance ceiling".to_string());
        }

        if self.heartbeat_ms == 0 {
            return Err("Heartbeat interval must be non-zero".to_string());
        }

        if self.queue_capacity == 0 {
            return Err("Queue capacity must be non-zero".to_string());
        }

        if self.max_sessions == 0 {
            return Err("Max sessions must be non-zero".to_string());
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
