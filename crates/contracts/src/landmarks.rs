//! Landmark detection data
//!
//! What detectors deliver and what landmark sinks send.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::Frame;

/// Detector families; one shared detector instance per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Hands,
    Body,
    Face,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 3] = [DetectorKind::Hands, DetectorKind::Body, DetectorKind::Face];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Hands => "hands",
            DetectorKind::Body => "body",
            DetectorKind::Face => "face",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 2D point in normalized image-fraction coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

/// 3D point
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    pub fn from_array(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// One detected entity (a hand, a body, a face)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectedEntity {
    /// Normalized image points, in detector-native order
    pub image_points: Vec<Point2>,

    /// Model-relative 3D points, same order and length as `image_points`
    pub model_points: Vec<Point3>,
}

/// Completed detection delivered by a detector callback
#[derive(Debug, Clone)]
pub struct DetectionResult {
    /// Timestamp counter the detection was submitted with
    pub timestamp: u64,

    /// Entity name -> points
    pub entities: BTreeMap<String, DetectedEntity>,

    /// Image the detection ran on
    pub frame: Frame,
}

/// Landmark sink payload: entity name -> ordered points
///
/// Serializes as `{"<Entity>": [{"x":..,"y":..,"z":..}, ...]}`.
pub type Landmarks = BTreeMap<String, Vec<Point3>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmarks_wire_format() {
        let mut landmarks = Landmarks::new();
        landmarks.insert("Left".to_string(), vec![Point3::new(1.0, 2.0, 3.0)]);
        let json = serde_json::to_string(&landmarks).unwrap();
        assert_eq!(json, r#"{"Left":[{"x":1.0,"y":2.0,"z":3.0}]}"#);
    }

    #[test]
    fn test_detector_kind_names() {
        let names: Vec<_> = DetectorKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["hands", "body", "face"]);
    }
}
