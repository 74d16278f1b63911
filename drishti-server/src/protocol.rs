//! Wire protocol shared by the WebSocket and SSE transports

use drishti_vision::{DistanceBucket, Position, ThreatLevel};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Frame submission body for `POST /process-frame`. WebSocket clients may
/// send either this JSON shape or the bare data-URL string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameData {
    /// Base64 data URL (`data:image/jpeg;base64,...`) or bare base64
    pub frame: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// One tracked, confirmed object as reported to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectReport {
    pub id: u64,
    /// Class label
    pub object: String,
    pub confidence: f32,
    pub position: Position,
    /// Proximity score, 0 (touching) to 10 (far)
    pub distance: f32,
    pub distance_bucket: DistanceBucket,
    /// x, y, w, h in frame pixels
    pub bbox: [f32; 4],
}

/// An object that crossed the threat policy and passed alert deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatReport {
    #[serde(flatten)]
    pub object: ObjectReport,
    pub threat_level: ThreatLevel,
    pub assessment: String,
}

/// Per-frame pipeline output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMessage {
    pub timestamp: String,
    pub device: String,
    pub inference_ms: u64,
    pub objects: Vec<ObjectReport>,
    pub threats: Vec<ThreatReport>,
}

/// Server-to-client events. Serialized as tagged JSON on the WebSocket; the
/// tag doubles as the SSE event name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    #[serde(rename = "connected")]
    Connected { session_id: String },
    #[serde(rename = "objects")]
    Objects(ResultMessage),
    /// Spoken-style scene summary for the current frame.
    #[serde(rename = "description")]
    Description { timestamp: String, text: String },
    #[serde(rename = "heartbeat")]
    Heartbeat { timestamp: String },
    #[serde(rename = "error")]
    Error { message: String },
}

impl SessionEvent {
    pub fn connected(session_id: impl Into<String>) -> Self {
        SessionEvent::Connected {
            session_id: session_id.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SessionEvent::Error {
            message: message.into(),
        }
    }

    pub fn description(text: impl Into<String>) -> Self {
        SessionEvent::Description {
            timestamp: chrono::Utc::now().to_rfc3339(),
            text: text.into(),
        }
    }

    pub fn heartbeat() -> Self {
        SessionEvent::Heartbeat {
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// SSE event name; matches the JSON tag.
    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::Connected { .. } => "connected",
            SessionEvent::Objects(_) => "objects",
            SessionEvent::Description { .. } => "description",
            SessionEvent::Heartbeat { .. } => "heartbeat",
            SessionEvent::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Event body without the tag, for SSE data fields where the name is
    /// carried out of band.
    pub fn payload_json(&self) -> serde_json::Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let JsonValue::Object(ref mut map) = value {
            map.remove("type");
        }
        serde_json::to_string(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drishti_vision::{DistanceBucket, Position, ThreatLevel};

    fn sample_object() -> ObjectReport {
        ObjectReport {
            id: 3,
            object: "person".to_string(),
            confidence: 0.91,
            position: Position::Left,
            distance: 4.0,
            distance_bucket: DistanceBucket::VeryClose,
            bbox: [0.0, 0.0, 60.0, 80.0],
        }
    }

    #[test]
    fn test_event_tags() {
        let event = SessionEvent::connected("abc");
        let json = event.to_json().unwrap();
        assert!(json.contains("\"type\":\"connected\""));
        assert!(json.contains("\"session_id\":\"abc\""));
        assert_eq!(event.event_name(), "connected");
    }

    #[test]
    fn test_result_event_flattens_threat_object() {
        let result = ResultMessage {
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            device: "cpu".to_string(),
            inference_ms: 12,
            objects: vec![],
            threats: vec![ThreatReport {
                object: sample_object(),
                threat_level: ThreatLevel::Medium,
                assessment: "Medium Alert: person at left (4.0)".to_string(),
            }],
        };
        let json = SessionEvent::Objects(result).to_json().unwrap();
        assert!(json.contains("\"type\":\"objects\""));
        // Threat entries carry the object fields inline
        assert!(json.contains("\"object\":\"person\""));
        assert!(json.contains("\"threat_level\":\"medium\""));
        assert!(json.contains("\"position\":\"left\""));
    }

    #[test]
    fn test_description_event_shape() {
        let event = SessionEvent::description("a person is very close on the left");
        assert_eq!(event.event_name(), "description");
        let json = event.to_json().unwrap();
        assert!(json.contains("\"type\":\"description\""));
        assert!(json.contains("\"text\":\"a person is very close on the left\""));
    }

    #[test]
    fn test_payload_json_strips_tag() {
        let event = SessionEvent::error("decode failed");
        let payload = event.payload_json().unwrap();
        assert!(!payload.contains("\"type\""));
        assert!(payload.contains("\"message\":\"decode failed\""));
    }

    #[test]
    fn test_frame_data_accepts_minimal_body() {
        let body: FrameData = serde_json::from_str(r#"{"frame":"data:image/jpeg;base64,AAAA"}"#).unwrap();
        assert!(body.session_id.is_none());
        assert!(body.timestamp.is_none());
    }
}
