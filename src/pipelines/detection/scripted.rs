// SPDX-License-Identifier: GPL-3.0-only

//! Detector that reports a fixed set of boxes
//!
//! Stands in for a real model when running against the synthetic sensor
//! or a recording with known object positions.

use super::{DetectionBox, ObjectDetector};
use crate::backends::camera::types::ColorImage;
use crate::errors::{DetectionError, DetectionResult};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ScriptedDetector {
    boxes: Vec<DetectionBox>,
}

impl ScriptedDetector {
    pub fn new(boxes: Vec<DetectionBox>) -> Self {
        Self { boxes }
    }

    /// Load boxes from a JSON array of `{x1, y1, x2, y2, confidence, class_id}`
    pub fn from_file(path: &Path) -> DetectionResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DetectionError::DetectorFailed(format!("{}: {}", path.display(), e)))?;
        let boxes: Vec<DetectionBox> = serde_json::from_str(&text)
            .map_err(|e| DetectionError::DetectorFailed(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), boxes = boxes.len(), "Loaded scripted detections");
        Ok(Self { boxes })
    }

    /// Boxes matching the blocks drawn by the synthetic sensor
    pub fn synthetic_scene() -> Self {
        Self::new(vec![
            DetectionBox::new(100, 100, 200, 200, 0.91, 0),
            DetectionBox::new(300, 50, 400, 150, 0.84, 1),
            DetectionBox::new(800, 400, 960, 520, 0.42, 2),
        ])
    }
}

impl ObjectDetector for ScriptedDetector {
    fn infer(&self, _image: &ColorImage, threshold: f64) -> DetectionResult<Vec<DetectionBox>> {
        Ok(self
            .boxes
            .iter()
            .filter(|b| b.confidence >= threshold)
            .copied()
            .collect())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_applied() {
        let detector = ScriptedDetector::synthetic_scene();
        let img = ColorImage::new(1, 1);
        assert_eq!(detector.infer(&img, 0.0).unwrap().len(), 3);
        assert_eq!(detector.infer(&img, 0.5).unwrap().len(), 2);
        assert!(detector.infer(&img, 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boxes.json");
        std::fs::write(
            &path,
            r#"[{"x1": 1, "y1": 2, "x2": 3, "y2": 4, "confidence": 0.7}]"#,
        )
        .unwrap();
        let detector = ScriptedDetector::from_file(&path).unwrap();
        let boxes = detector.infer(&ColorImage::new(1, 1), 0.5).unwrap();
        assert_eq!(boxes, vec![DetectionBox::new(1, 2, 3, 4, 0.7, 0)]);
    }

    #[test]
    fn test_bad_file_is_detector_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(matches!(
            ScriptedDetector::from_file(&path),
            Err(DetectionError::DetectorFailed(_))
        ));
    }
}
