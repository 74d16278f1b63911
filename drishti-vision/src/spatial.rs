//! Spatial heuristics derived from box geometry
//!
//! Pure functions over a single frame; no state is carried between frames.
//! Proximity is a heuristic derived from apparent size, not a calibrated
//! distance measurement.

use serde::{Deserialize, Serialize};

/// Horizontal position of an object within the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Center,
    Right,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Left => "left",
            Position::Center => "center",
            Position::Right => "right",
        }
    }
}

/// Band the box center by thirds of the frame width.
pub fn position(center_x: f32, frame_width: f32) -> Position {
    if frame_width <= 0.0 || !center_x.is_finite() {
        return Position::Center;
    }
    let ratio = center_x / frame_width;
    if ratio < 0.33 {
        Position::Left
    } else if ratio > 0.66 {
        Position::Right
    } else {
        Position::Center
    }
}

/// Proximity score on a 0..=10 scale, lower meaning closer. Computed as
/// `10 * (1 - box_area / frame_area)`, rounded to two decimals. Degenerate
/// geometry yields the maximum score.
pub fn distance_score(box_area: f32, frame_area: f32) -> f32 {
    if frame_area <= 0.0 || !box_area.is_finite() || box_area < 0.0 {
        return 10.0;
    }
    let ratio = (box_area / frame_area).clamp(0.0, 1.0);
    let score = 10.0 * (1.0 - ratio);
    (score * 100.0).round() / 100.0
}

/// Coarse proximity bucket from the area ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceBucket {
    VeryClose,
    Close,
    Medium,
    Far,
    VeryFar,
}

impl DistanceBucket {
    /// `ratio` is box area over frame area.
    pub fn from_ratio(ratio: f32) -> Self {
        if !ratio.is_finite() || ratio <= 0.0 {
            return DistanceBucket::VeryFar;
        }
        if ratio > 0.5 {
            DistanceBucket::VeryClose
        } else if ratio > 0.2 {
            DistanceBucket::Close
        } else if ratio > 0.1 {
            DistanceBucket::Medium
        } else if ratio > 0.02 {
            DistanceBucket::Far
        } else {
            DistanceBucket::VeryFar
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceBucket::VeryClose => "very close",
            DistanceBucket::Close => "close",
            DistanceBucket::Medium => "medium",
            DistanceBucket::Far => "far",
            DistanceBucket::VeryFar => "very far",
        }
    }
}
