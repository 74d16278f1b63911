//! Per-session frame pipeline
//!
//! Each connected client gets its own `Session` holding a fresh tracker and
//! alert state. The pipeline runs decode -> detect -> track -> spatial ->
//! threat -> narration and produces exactly one event per submitted frame.
//! Decode and inference failures are contained as `error` events; the session
//! keeps accepting frames.

use crate::protocol::{ObjectReport, ResultMessage, SessionEvent, ThreatReport};
use crate::state::AppState;
use drishti_core::ServerConfig;
use drishti_vision::{
    distance_score, frame, position, AlertSuppressor, DistanceBucket, ThreatPolicy, TrackManager,
    TrackView,
};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

pub struct Session {
    pub id: String,
    state: SessionState,
    tracker: TrackManager,
    suppressor: AlertSuppressor,
    policy: ThreatPolicy,
}

impl Session {
    pub fn new(id: impl Into<String>, config: &ServerConfig) -> Self {
        Self {
            id: id.into(),
            state: SessionState::Connecting,
            tracker: TrackManager::new(
                config.tracker.max_age,
                config.tracker.n_init,
                config.tracker.iou_threshold,
            ),
            suppressor: AlertSuppressor::new(Duration::from_secs(
                config.threat.alert_cooldown_secs,
            )),
            policy: ThreatPolicy::new(
                config.threat.distance_ceiling,
                config.threat.high_severity_distance,
            ),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn open(&mut self) {
        self.state = SessionState::Open;
    }

    pub fn begin_close(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Closing;
        }
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Run the full pipeline on one frame payload.
    pub async fn process_frame(&mut self, payload: &str, app: &AppState) -> SessionEvent {
        let frame = match frame::decode_data_url(payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(session = %self.id, error = %e, "Frame decode failed");
                return SessionEvent::error("frame decode failed");
            }
        };

        let Some(detector) = app.detector.as_ref() else {
            return SessionEvent::error("detector unavailable");
        };

        let frame_area = frame.area();
        let frame_width = frame.width as f32;
        let device = detector.device();

        // Inference runs on the blocking pool so one session's detector call
        // never stalls the other sessions' tasks
        let started = Instant::now();
        let detector = detector.clone();
        let detections =
            match tokio::task::spawn_blocking(move || detector.detect(&frame)).await {
                Ok(Ok(detections)) => detections,
                Ok(Err(e)) => {
                    warn!(session = %self.id, error = %e, "Inference failed");
                    return SessionEvent::error("inference failed");
                }
                Err(e) => {
                    warn!(session = %self.id, error = %e, "Inference task failed");
                    return SessionEvent::error("inference failed");
                }
            };
        let inference_ms = started.elapsed().as_millis() as u64;

        let tracks = self.tracker.update(&detections);

        let mut objects = Vec::new();
        let mut threats = Vec::new();
        let now = Instant::now();

        for view in tracks {
            let report = build_report(&view, frame_width, frame_area);

            match self.policy.classify(&report.object, report.distance) {
                Some(level) if self.suppressor.should_alert(view.id, now) => {
                    let summary =
                        serde_json::to_value(&report).unwrap_or(serde_json::Value::Null);
                    let assessment = app.narrator.assess_threat(&summary).await;
                    threats.push(ThreatReport {
                        object: report,
                        threat_level: level,
                        assessment,
                    });
                }
                // Threats inside the cooldown window still appear as objects
                _ => objects.push(report),
            }
        }

        self.suppressor.retain_live(&self.tracker.live_ids());

        debug!(
            session = %self.id,
            objects = objects.len(),
            threats = threats.len(),
            inference_ms,
            "Frame processed"
        );

        SessionEvent::Objects(ResultMessage {
            timestamp: chrono::Utc::now().to_rfc3339(),
            device: device.to_string(),
            inference_ms,
            objects,
            threats,
        })
    }
}

/// Condense a result into the JSON the narrator turns into a spoken-style
/// scene description. Threat entries carry their severity.
pub fn scene_summary(result: &ResultMessage) -> serde_json::Value {
    let mut items: Vec<serde_json::Value> = Vec::new();
    for report in &result.objects {
        items.push(serde_json::json!({
            "object": report.object,
            "position": report.position.as_str(),
            "proximity": report.distance_bucket.as_str(),
            "distance": report.distance,
        }));
    }
    for threat in &result.threats {
        items.push(serde_json::json!({
            "object": threat.object.object,
            "position": threat.object.position.as_str(),
            "proximity": threat.object.distance_bucket.as_str(),
            "distance": threat.object.distance,
            "threat_level": threat.threat_level.as_str(),
        }));
    }
    serde_json::Value::Array(items)
}

fn build_report(view: &TrackView, frame_width: f32, frame_area: f32) -> ObjectReport {
    let bbox = &view.detection.bbox;
    let ratio = if frame_area > 0.0 {
        bbox.area() / frame_area
    } else {
        0.0
    };

    ObjectReport {
        id: view.id,
        object: view.detection.label.clone(),
        confidence: view.detection.confidence,
        position: position(bbox.center_x(), frame_width),
        distance: distance_score(bbox.area(), frame_area),
        distance_bucket: DistanceBucket::from_ratio(ratio),
        bbox: bbox.as_array(),
    }
}
