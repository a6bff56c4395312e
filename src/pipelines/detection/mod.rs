// SPDX-License-Identifier: GPL-3.0-only

//! Object detection and 3D localization
//!
//! - [`aggregator`]: boxes + depth -> centimeter records and wire lists
//! - [`annotate`]: box outlines on the color image
//! - [`scripted`]: detector returning fixed boxes
//! - [`service`]: on-demand request path (snapshot, aggregate, store, send)

pub mod aggregator;
pub mod annotate;
pub mod scripted;
pub mod service;

pub use aggregator::{Aggregation, DetectionAggregator};
pub use scripted::ScriptedDetector;
pub use service::{DetectionReport, DetectionService};

use crate::backends::camera::types::ColorImage;
use crate::errors::{DetectionError, DetectionResult};
use serde::{Deserialize, Serialize};

/// One detector output box in color-image pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub confidence: f64,
    #[serde(default)]
    pub class_id: u32,
}

impl DetectionBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f64, class_id: u32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
        }
    }

    /// Box center, truncated to whole pixels
    pub fn center(&self) -> [i32; 2] {
        [midpoint(self.x1, self.x2), midpoint(self.y1, self.y2)]
    }
}

/// Sum in i64 so corners near the i32 limits cannot overflow
fn midpoint(a: i32, b: i32) -> i32 {
    ((a as i64 + b as i64) / 2) as i32
}

/// Object detector interface
pub trait ObjectDetector: Send + Sync {
    /// Detect objects with confidence at least `threshold`
    fn infer(&self, image: &ColorImage, threshold: f64) -> DetectionResult<Vec<DetectionBox>>;

    /// Detector name for logging
    fn name(&self) -> &str;
}

/// Which box corners get a 3D coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CornerMode {
    /// Start and end corners: `[sx, sy, sz, ex, ey, ez]`
    #[default]
    Both,
    /// Start corner only: `[sx, sy, sz]`
    Start,
}

/// Box corners in pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BboxPixel {
    pub starting_pixel: [i32; 2],
    pub ending_pixel: [i32; 2],
}

/// Box corners in centimeters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BboxCoordinate {
    pub starting_coordinate: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_coordinate: Option<[f64; 3]>,
}

/// Whether real depth was found at each looked-up pixel
///
/// A `false` entry means the matching coordinate is the zero vector
/// because the sensor had no depth there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthValidity {
    pub start: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<bool>,
    pub center: bool,
}

/// One localized detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub bbox_pixel: BboxPixel,
    pub bbox_coordinate_cm: BboxCoordinate,
    pub center_pixel: [i32; 2],
    pub center_coordinate_cm: [f64; 3],
    pub confidence: f64,
    pub class_id: u32,
    pub depth_valid: DepthValidity,
}

impl DetectionRecord {
    /// Flattened corner list as sent on the wire
    pub fn bbox_coordinates(&self) -> Vec<f64> {
        let mut out = self.bbox_coordinate_cm.starting_coordinate.to_vec();
        if let Some(end) = self.bbox_coordinate_cm.ending_coordinate {
            out.extend_from_slice(&end);
        }
        out
    }
}

/// Reject thresholds outside [0, 1]
pub fn validate_threshold(threshold: f64) -> DetectionResult<f64> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(DetectionError::InvalidThreshold(threshold));
    }
    Ok(threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_truncates() {
        assert_eq!(DetectionBox::new(100, 100, 201, 203, 0.9, 0).center(), [150, 151]);
    }

    #[test]
    fn test_center_of_extreme_corners() {
        let far = DetectionBox::new(i32::MAX - 2, i32::MIN, i32::MAX, i32::MIN + 4, 0.9, 0);
        assert_eq!(far.center(), [i32::MAX - 1, i32::MIN + 2]);
        let wide = DetectionBox::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX, 0.9, 0);
        assert_eq!(wide.center(), [0, 0]);
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(1.01).is_err());
        assert!(validate_threshold(-0.1).is_err());
        assert!(validate_threshold(f64::NAN).is_err());
    }
}
