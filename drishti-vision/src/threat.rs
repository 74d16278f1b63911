//! Threat classification and alert suppression

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Labels that warrant a threat alert when close enough.
const DEFAULT_THREAT_CLASSES: &[&str] = &[
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "bus",
    "truck",
    "train",
    "bench",
    "chair",
    "couch",
    "bed",
    "dining table",
    "knife",
    "bottle",
    "cup",
    "fork",
    "spoon",
    "bowl",
    "fire hydrant",
    "stop sign",
    "traffic light",
    "parking meter",
    "dog",
    "cat",
    "horse",
    "cow",
    "elephant",
    "bear",
    "backpack",
    "umbrella",
    "suitcase",
    "skateboard",
    "refrigerator",
    "toilet",
    "sink",
    "potted plant",
    "laptop",
    "cell phone",
    "remote",
    "microwave",
    "oven",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Medium,
    High,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Medium => "medium",
            ThreatLevel::High => "high",
        }
    }
}

/// Severity policy over label and proximity score.
///
/// An object is a threat when its label is in the watched set and its
/// distance score is below `distance_ceiling`. Severity escalates to high
/// below `high_severity_distance`.
pub struct ThreatPolicy {
    classes: HashSet<&'static str>,
    distance_ceiling: f32,
    high_severity_distance: f32,
}

impl ThreatPolicy {
    pub fn new(distance_ceiling: f32, high_severity_distance: f32) -> Self {
        Self {
            classes: DEFAULT_THREAT_CLASSES.iter().copied().collect(),
            distance_ceiling,
            high_severity_distance,
        }
    }

    pub fn classify(&self, label: &str, distance: f32) -> Option<ThreatLevel> {
        if !self.classes.contains(label) || !distance.is_finite() {
            return None;
        }
        if distance >= self.distance_ceiling {
            return None;
        }
        if distance < self.high_severity_distance {
            Some(ThreatLevel::High)
        } else {
            Some(ThreatLevel::Medium)
        }
    }
}

impl Default for ThreatPolicy {
    fn default() -> Self {
        Self::new(10.0, 3.0)
    }
}

/// Per-session alert deduplication.
///
/// A track identity alerts at most once per cooldown window, however many
/// frames it stays a threat for. State for dead tracks is dropped via
/// `retain_live` so the map never outgrows the live track set.
pub struct AlertSuppressor {
    cooldown: Duration,
    last_alert: HashMap<u64, Instant>,
}

impl AlertSuppressor {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_alert: HashMap::new(),
        }
    }

    /// Record and allow an alert for `track_id` unless one fired within the
    /// cooldown window.
    pub fn should_alert(&mut self, track_id: u64, now: Instant) -> bool {
        match self.last_alert.get(&track_id) {
            Some(last) if now.duration_since(*last) < self.cooldown => false,
            _ => {
                self.last_alert.insert(track_id, now);
                true
            }
        }
    }

    /// Drop suppression state for tracks no longer alive.
    pub fn retain_live(&mut self, live_ids: &[u64]) {
        self.last_alert.retain(|id, _| live_ids.contains(id));
    }

    pub fn len(&self) -> usize {
        self.last_alert.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_alert.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threat_requires_watched_label() {
        let policy = ThreatPolicy::default();
        assert!(policy.classify("person", 5.0).is_some());
        assert!(policy.classify("kite", 5.0).is_none());
        assert!(policy.classify("", 5.0).is_none());
    }

    #[test]
    fn test_threat_requires_proximity() {
        let policy = ThreatPolicy::default();
        assert!(policy.classify("person", 9.99).is_some());
        assert!(policy.classify("person", 10.0).is_none());
        assert!(policy.classify("person", 12.5).is_none());
    }

    #[test]
    fn test_severity_boundary() {
        let policy = ThreatPolicy::default();
        assert_eq!(policy.classify("knife", 2.99), Some(ThreatLevel::High));
        assert_eq!(policy.classify("knife", 3.0), Some(ThreatLevel::Medium));
        assert_eq!(policy.classify("knife", 9.0), Some(ThreatLevel::Medium));
        assert_eq!(policy.classify("knife", 0.0), Some(ThreatLevel::High));
    }

    #[test]
    fn test_non_finite_distance_is_not_a_threat() {
        let policy = ThreatPolicy::default();
        assert!(policy.classify("person", f32::NAN).is_none());
        assert!(policy.classify("person", f32::INFINITY).is_none());
    }

    #[test]
    fn test_suppressor_first_alert_passes() {
        let mut sup = AlertSuppressor::new(Duration::from_secs(30));
        let now = Instant::now();
        assert!(sup.should_alert(1, now));
        assert_eq!(sup.len(), 1);
    }

    #[test]
    fn test_suppressor_within_cooldown_blocks() {
        let mut sup = AlertSuppressor::new(Duration::from_secs(30));
        let t0 = Instant::now();
        assert!(sup.should_alert(7, t0));
        assert!(!sup.should_alert(7, t0 + Duration::from_secs(1)));
        assert!(!sup.should_alert(7, t0 + Duration::from_secs(29)));
    }

    #[test]
    fn test_suppressor_reopens_after_cooldown() {
        let mut sup = AlertSuppressor::new(Duration::from_secs(30));
        let t0 = Instant::now();
        assert!(sup.should_alert(7, t0));
        assert!(sup.should_alert(7, t0 + Duration::from_secs(30)));
        // The window restarts from the second alert
        assert!(!sup.should_alert(7, t0 + Duration::from_secs(31)));
    }

    #[test]
    fn test_suppressor_tracks_are_independent() {
        let mut sup = AlertSuppressor::new(Duration::from_secs(30));
        let t0 = Instant::now();
        assert!(sup.should_alert(1, t0));
        assert!(sup.should_alert(2, t0));
        assert!(!sup.should_alert(1, t0 + Duration::from_secs(5)));
        assert!(sup.should_alert(3, t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_retain_live_drops_dead_tracks() {
        let mut sup = AlertSuppressor::new(Duration::from_secs(30));
        let t0 = Instant::now();
        sup.should_alert(1, t0);
        sup.should_alert(2, t0);
        sup.should_alert(3, t0);

        sup.retain_live(&[2]);
        assert_eq!(sup.len(), 1);

        // A dead track that comes back alerts immediately
        assert!(sup.should_alert(1, t0 + Duration::from_secs(1)));
    }
}
