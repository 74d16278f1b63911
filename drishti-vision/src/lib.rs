//! drishti-vision: per-frame detection, tracking and threat heuristics
//!
//! The frame pipeline runs decode -> detect -> track -> spatial heuristics ->
//! threat classification. The detector sits behind the [`Detector`] trait so
//! the ONNX backend (feature `onnx`) and test stubs share one seam; tracking
//! and alert suppression are plain owned state, one instance per session.

pub mod detect;
pub mod error;
pub mod frame;
pub mod spatial;
pub mod threat;
pub mod tracker;

pub use detect::{BBox, Detection, Detector};
#[cfg(feature = "onnx")]
pub use detect::onnx::OnnxDetector;
pub use error::VisionError;
pub use frame::Frame;
pub use spatial::{distance_score, position, DistanceBucket, Position};
pub use threat::{AlertSuppressor, ThreatLevel, ThreatPolicy};
pub use tracker::{TrackManager, TrackView};
