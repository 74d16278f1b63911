//! Multi-object tracking
//!
//! Greedy IoU association with track confirmation. Each session owns its own
//! `TrackManager`; nothing here is shared between connections, so identities
//! from one camera can never leak into another.

use crate::detect::Detection;
use std::collections::HashMap;
use tracing::debug;

/// A track as reported to downstream consumers. Only confirmed tracks are
/// ever surfaced.
#[derive(Debug, Clone)]
pub struct TrackView {
    pub id: u64,
    pub detection: Detection,
    /// Frames since this track last matched a detection
    pub age: u32,
}

#[derive(Debug, Clone)]
struct Track {
    id: u64,
    detection: Detection,
    age: u32,
    hits: u32,
    confirmed: bool,
}

/// Per-session multi-object tracker.
///
/// Detections are associated to existing tracks by best IoU above the
/// threshold; each track can claim at most one detection per frame. A new
/// track stays tentative until it has matched on `n_init` frames, and a
/// tentative track is dropped the first frame it goes unmatched. Confirmed
/// tracks survive up to `max_age` consecutive misses. Track ids are
/// monotonically increasing and never reused within a session.
pub struct TrackManager {
    next_id: u64,
    tracks: HashMap<u64, Track>,
    max_age: u32,
    n_init: u32,
    iou_threshold: f32,
}

impl TrackManager {
    pub fn new(max_age: u32, n_init: u32, iou_threshold: f32) -> Self {
        Self {
            next_id: 1,
            tracks: HashMap::new(),
            max_age,
            n_init: n_init.max(1),
            iou_threshold,
        }
    }

    /// Advance the tracker by one frame and return the confirmed tracks.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackView> {
        // Age existing tracks; matches below reset age to 0
        for track in self.tracks.values_mut() {
            track.age += 1;
        }

        let mut claimed: Vec<u64> = Vec::with_capacity(detections.len());
        let mut matched = vec![false; detections.len()];

        for (det_idx, detection) in detections.iter().enumerate() {
            let mut best_match: Option<(u64, f32)> = None;

            for (track_id, track) in self.tracks.iter() {
                if claimed.contains(track_id) {
                    continue;
                }

                let iou = detection.bbox.iou(&track.detection.bbox);
                if iou > self.iou_threshold {
                    match best_match {
                        Some((_, best_iou)) if iou <= best_iou => {}
                        _ => best_match = Some((*track_id, iou)),
                    }
                }
            }

            if let Some((track_id, _)) = best_match {
                if let Some(track) = self.tracks.get_mut(&track_id) {
                    track.detection = detection.clone();
                    track.age = 0;
                    track.hits += 1;
                    if track.hits >= self.n_init {
                        track.confirmed = true;
                    }
                    claimed.push(track_id);
                    matched[det_idx] = true;
                }
            }
        }

        // New tentative tracks for unmatched detections
        for (det_idx, detection) in detections.iter().enumerate() {
            if matched[det_idx] {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            self.tracks.insert(
                id,
                Track {
                    id,
                    detection: detection.clone(),
                    age: 0,
                    hits: 1,
                    confirmed: self.n_init <= 1,
                },
            );
        }

        // Tentative tracks do not survive a miss; confirmed tracks survive
        // up to max_age misses
        let max_age = self.max_age;
        self.tracks
            .retain(|_, t| if t.confirmed { t.age <= max_age } else { t.age == 0 });

        let mut views: Vec<TrackView> = self
            .tracks
            .values()
            .filter(|t| t.confirmed)
            .map(|t| TrackView {
                id: t.id,
                detection: t.detection.clone(),
                age: t.age,
            })
            .collect();
        views.sort_by_key(|v| v.id);

        debug!(
            confirmed = views.len(),
            total = self.tracks.len(),
            "Tracker updated"
        );
        views
    }

    /// Ids of all live tracks, confirmed or not.
    pub fn live_ids(&self) -> Vec<u64> {
        self.tracks.keys().copied().collect()
    }

    pub fn confirmed_count(&self) -> usize {
        self.tracks.values().filter(|t| t.confirmed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BBox;

    fn create_detection(label: &str, confidence: f32, bbox: (f32, f32, f32, f32)) -> Detection {
        Detection {
            label: label.to_string(),
            confidence,
            bbox: BBox::new(bbox.0, bbox.1, bbox.2, bbox.3),
        }
    }

    #[test]
    fn test_tracker_new() {
        let tracker = TrackManager::new(10, 3, 0.3);
        assert_eq!(tracker.confirmed_count(), 0);
        assert!(tracker.live_ids().is_empty());
    }

    #[test]
    fn test_tracker_update_empty() {
        let mut tracker = TrackManager::new(10, 3, 0.3);
        let tracks = tracker.update(&[]);
        assert_eq!(tracks.len(), 0);
    }

    #[test]
    fn test_new_track_is_tentative() {
        let mut tracker = TrackManager::new(10, 3, 0.3);
        let detections = vec![create_detection("person", 0.9, (10.0, 10.0, 50.0, 50.0))];
        let tracks = tracker.update(&detections);
        // Not confirmed yet, so not reported
        assert_eq!(tracks.len(), 0);
        assert_eq!(tracker.live_ids().len(), 1);
    }

    #[test]
    fn test_confirmation_after_n_init_frames() {
        let mut tracker = TrackManager::new(10, 3, 0.3);
        let detections = vec![create_detection("person", 0.9, (10.0, 10.0, 50.0, 50.0))];

        assert_eq!(tracker.update(&detections).len(), 0);
        assert_eq!(tracker.update(&detections).len(), 0);
        let tracks = tracker.update(&detections);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].detection.label, "person");
        assert_eq!(tracks[0].age, 0);
    }

    #[test]
    fn test_tracking_across_frames_keeps_id() {
        let mut tracker = TrackManager::new(10, 1, 0.3);

        let tracks1 = tracker.update(&[create_detection("person", 0.9, (10.0, 10.0, 50.0, 50.0))]);
        assert_eq!(tracks1.len(), 1);
        let track_id = tracks1[0].id;

        // Same object slightly moved
        let tracks2 = tracker.update(&[create_detection("person", 0.9, (12.0, 12.0, 50.0, 50.0))]);
        assert_eq!(tracks2.len(), 1);
        assert_eq!(tracks2[0].id, track_id);
        assert_eq!(tracks2[0].age, 0);
    }

    #[test]
    fn test_multiple_detections_get_distinct_tracks() {
        let mut tracker = TrackManager::new(10, 1, 0.3);
        let detections = vec![
            create_detection("person", 0.9, (10.0, 10.0, 50.0, 50.0)),
            create_detection("car", 0.8, (200.0, 200.0, 60.0, 60.0)),
        ];
        let tracks = tracker.update(&detections);
        assert_eq!(tracks.len(), 2);
        assert_ne!(tracks[0].id, tracks[1].id);
    }

    #[test]
    fn test_one_track_claims_one_detection() {
        let mut tracker = TrackManager::new(10, 2, 0.3);
        tracker.update(&[create_detection("person", 0.9, (10.0, 10.0, 50.0, 50.0))]);

        // Two near-identical detections must not share a track: the first
        // claims the existing track and reaches confirmation, the second
        // starts a fresh tentative track
        let tracks = tracker.update(&[
            create_detection("person", 0.9, (11.0, 11.0, 50.0, 50.0)),
            create_detection("person", 0.85, (12.0, 12.0, 50.0, 50.0)),
        ]);
        assert_eq!(tracker.live_ids().len(), 2);
        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn test_confirmed_track_survives_misses() {
        let mut tracker = TrackManager::new(5, 1, 0.3);
        tracker.update(&[create_detection("person", 0.9, (10.0, 10.0, 50.0, 50.0))]);

        for _ in 0..5 {
            let tracks = tracker.update(&[]);
            assert_eq!(tracks.len(), 1);
        }

        // Past max_age the track is evicted
        let tracks = tracker.update(&[]);
        assert_eq!(tracks.len(), 0);
        assert!(tracker.live_ids().is_empty());
    }

    #[test]
    fn test_tentative_track_dropped_on_first_miss() {
        let mut tracker = TrackManager::new(10, 3, 0.3);
        tracker.update(&[create_detection("person", 0.9, (10.0, 10.0, 50.0, 50.0))]);
        assert_eq!(tracker.live_ids().len(), 1);

        tracker.update(&[]);
        assert!(tracker.live_ids().is_empty());

        // Reappearance starts its confirmation count over
        tracker.update(&[create_detection("person", 0.9, (10.0, 10.0, 50.0, 50.0))]);
        tracker.update(&[create_detection("person", 0.9, (10.0, 10.0, 50.0, 50.0))]);
        assert_eq!(tracker.confirmed_count(), 0);
    }

    #[test]
    fn test_ids_never_reused() {
        let mut tracker = TrackManager::new(2, 1, 0.3);

        let tracks = tracker.update(&[create_detection("person", 0.9, (10.0, 10.0, 50.0, 50.0))]);
        let first_id = tracks[0].id;

        // Let the track die, then track a fresh object in the same spot
        for _ in 0..3 {
            tracker.update(&[]);
        }
        assert!(tracker.live_ids().is_empty());

        let tracks = tracker.update(&[create_detection("person", 0.9, (10.0, 10.0, 50.0, 50.0))]);
        assert!(tracks[0].id > first_id);
    }

    #[test]
    fn test_no_match_below_iou_threshold() {
        let mut tracker = TrackManager::new(10, 1, 0.3);
        let tracks1 = tracker.update(&[create_detection("person", 0.9, (10.0, 10.0, 50.0, 50.0))]);
        let first_id = tracks1[0].id;

        // Far away detection starts a new track instead of stealing the id
        let _ = tracker.update(&[create_detection("person", 0.9, (500.0, 500.0, 50.0, 50.0))]);
        assert_eq!(tracker.live_ids().len(), 2);
        assert!(tracker.live_ids().iter().any(|&id| id == first_id));
    }
}
