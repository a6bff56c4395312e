// SPDX-License-Identifier: GPL-3.0-only

//! Detection + depth -> localized records

use super::annotate::annotate;
use super::{
    BboxCoordinate, BboxPixel, CornerMode, DepthValidity, DetectionBox, DetectionRecord,
    ObjectDetector, validate_threshold,
};
use crate::backends::camera::types::{ColorImage, DepthFrame};
use crate::constants::detection::{BOX_COLOR, BOX_THICKNESS};
use crate::errors::DetectionResult;
use crate::pipelines::broker::CapturedSample;
use crate::pipelines::projection::{Deprojection, SpatialPoint, deproject};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything produced for one sample
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// In detector order
    pub records: Vec<DetectionRecord>,
    /// `[sx, sy, sz, ex, ey, ez]` per box (or `[sx, sy, sz]`)
    pub bbox_list: Vec<Vec<f64>>,
    /// `[cx, cy, cz]` per box
    pub center_list: Vec<Vec<f64>>,
    /// Color image with box outlines
    pub annotated: ColorImage,
}

impl Aggregation {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Clone)]
pub struct DetectionAggregator {
    detector: Arc<dyn ObjectDetector>,
    corner_mode: CornerMode,
}

impl DetectionAggregator {
    pub fn new(detector: Arc<dyn ObjectDetector>) -> Self {
        Self {
            detector,
            corner_mode: CornerMode::default(),
        }
    }

    pub fn with_corner_mode(mut self, mode: CornerMode) -> Self {
        self.corner_mode = mode;
        self
    }

    pub fn corner_mode(&self) -> CornerMode {
        self.corner_mode
    }

    /// Detect, localize and annotate one sample
    pub fn aggregate(&self, sample: &CapturedSample, threshold: f64) -> DetectionResult<Aggregation> {
        let threshold = validate_threshold(threshold)?;
        let boxes = self.detector.infer(&sample.color, threshold)?;

        // The detector is trusted to filter, but never emit below threshold
        let (boxes, dropped): (Vec<DetectionBox>, Vec<DetectionBox>) =
            boxes.into_iter().partition(|b| b.confidence >= threshold);
        if !dropped.is_empty() {
            warn!(
                detector = self.detector.name(),
                dropped = dropped.len(),
                threshold,
                "Detector returned boxes below threshold"
            );
        }

        let locator = PixelLocator::new(&sample.color, sample.depth.as_ref());
        let mut records = Vec::with_capacity(boxes.len());
        let mut bbox_list = Vec::with_capacity(boxes.len());
        let mut center_list = Vec::with_capacity(boxes.len());

        for b in &boxes {
            let record = self.localize(&locator, b);
            bbox_list.push(record.bbox_coordinates());
            center_list.push(record.center_coordinate_cm.to_vec());
            records.push(record);
        }

        debug!(
            detector = self.detector.name(),
            boxes = records.len(),
            sequence = sample.sequence,
            "Aggregated detections"
        );

        Ok(Aggregation {
            records,
            bbox_list,
            center_list,
            annotated: annotate(&sample.color, &boxes, BOX_COLOR, BOX_THICKNESS),
        })
    }

    fn localize(&self, locator: &PixelLocator<'_>, b: &DetectionBox) -> DetectionRecord {
        let start = locator.locate(b.x1, b.y1);
        let end = match self.corner_mode {
            CornerMode::Both => Some(locator.locate(b.x2, b.y2)),
            CornerMode::Start => None,
        };
        let center_pixel = b.center();
        let center = locator.locate(center_pixel[0], center_pixel[1]);

        DetectionRecord {
            bbox_pixel: BboxPixel {
                starting_pixel: [b.x1, b.y1],
                ending_pixel: [b.x2, b.y2],
            },
            bbox_coordinate_cm: BboxCoordinate {
                starting_coordinate: start.point.to_centimeters(),
                ending_coordinate: end.map(|e| e.point.to_centimeters()),
            },
            center_pixel,
            center_coordinate_cm: center.point.to_centimeters(),
            confidence: b.confidence,
            class_id: b.class_id,
            depth_valid: DepthValidity {
                start: start.is_valid(),
                end: end.map(|e| e.is_valid()),
                center: center.is_valid(),
            },
        }
    }
}

/// Maps color pixels onto the depth frame, which may be decimated
struct PixelLocator<'a> {
    depth: Option<&'a DepthFrame>,
    scale_x: f64,
    scale_y: f64,
}

impl<'a> PixelLocator<'a> {
    fn new(color: &ColorImage, depth: Option<&'a DepthFrame>) -> Self {
        let (cw, ch) = color.dimensions();
        let (scale_x, scale_y) = match depth {
            Some(d) if cw > 0 && ch > 0 => (d.width as f64 / cw as f64, d.height as f64 / ch as f64),
            _ => (1.0, 1.0),
        };
        Self {
            depth,
            scale_x,
            scale_y,
        }
    }

    fn locate(&self, x: i32, y: i32) -> Deprojection {
        let Some(depth) = self.depth else {
            return Deprojection {
                depth_m: 0.0,
                point: SpatialPoint::ZERO,
            };
        };
        // Depth comes from the containing cell, the ray keeps the fraction
        deproject(
            depth,
            &depth.intrinsics,
            x as f64 * self.scale_x,
            y as f64 * self.scale_y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::Intrinsics;
    use crate::errors::DetectionError;
    use crate::pipelines::detection::ScriptedDetector;

    fn sample(depth_m: f32) -> CapturedSample {
        let intr = Intrinsics::pinhole(1280, 720, 600.0, 600.0, 640.0, 360.0);
        CapturedSample {
            color: ColorImage::new(1280, 720),
            depth: Some(DepthFrame::flat(intr, 0.001, depth_m)),
            timestamp_ms: 0.0,
            sequence: 1,
        }
    }

    fn aggregator(boxes: Vec<DetectionBox>) -> DetectionAggregator {
        DetectionAggregator::new(Arc::new(ScriptedDetector::new(boxes)))
    }

    #[test]
    fn test_single_box_values() {
        let agg = aggregator(vec![DetectionBox::new(100, 100, 200, 200, 0.9, 3)])
            .aggregate(&sample(2.0), 0.5)
            .unwrap();
        assert_eq!(agg.bbox_list, vec![vec![-180.0, -86.67, 200.0, -146.67, -53.33, 200.0]]);
        assert_eq!(agg.center_list, vec![vec![-163.33, -70.0, 200.0]]);
        let record = &agg.records[0];
        assert_eq!(record.center_pixel, [150, 150]);
        assert_eq!(record.class_id, 3);
        assert!(record.depth_valid.center);
        // Outline drawn on the copy
        assert_eq!(agg.annotated.get_pixel(100, 100).0, BOX_COLOR);
    }

    #[test]
    fn test_start_corner_only() {
        let agg = aggregator(vec![DetectionBox::new(100, 100, 200, 200, 0.9, 0)])
            .with_corner_mode(CornerMode::Start)
            .aggregate(&sample(2.0), 0.5)
            .unwrap();
        assert_eq!(agg.bbox_list, vec![vec![-180.0, -86.67, 200.0]]);
        assert_eq!(agg.records[0].depth_valid.end, None);
    }

    #[test]
    fn test_missing_depth_gives_zero_vectors() {
        let mut s = sample(2.0);
        s.depth = None;
        let agg = aggregator(vec![DetectionBox::new(1, 1, 5, 5, 0.9, 0)])
            .aggregate(&s, 0.0)
            .unwrap();
        assert_eq!(agg.center_list, vec![vec![0.0, 0.0, 0.0]]);
        assert!(!agg.records[0].depth_valid.center);
    }

    #[test]
    fn test_low_confidence_never_emitted() {
        struct Sloppy;
        impl ObjectDetector for Sloppy {
            fn infer(&self, _: &ColorImage, _: f64) -> DetectionResult<Vec<DetectionBox>> {
                Ok(vec![
                    DetectionBox::new(0, 0, 2, 2, 0.2, 0),
                    DetectionBox::new(0, 0, 2, 2, 1.0, 0),
                ])
            }
            fn name(&self) -> &str {
                "sloppy"
            }
        }
        let agg = DetectionAggregator::new(Arc::new(Sloppy));
        for threshold in [0.0, 0.2, 0.5, 1.0] {
            let out = agg.aggregate(&sample(1.0), threshold).unwrap();
            assert!(out.records.iter().all(|r| r.confidence >= threshold));
        }
        assert_eq!(agg.aggregate(&sample(1.0), 1.0).unwrap().records.len(), 1);
        assert_eq!(agg.aggregate(&sample(1.0), 0.0).unwrap().records.len(), 2);
    }

    #[test]
    fn test_decimated_depth_rescales_pixels() {
        let intr = Intrinsics::pinhole(1280, 720, 600.0, 600.0, 640.0, 360.0).decimated(2);
        let mut s = sample(2.0);
        s.depth = Some(DepthFrame::flat(intr, 0.001, 2.0));
        let agg = aggregator(vec![DetectionBox::new(100, 100, 200, 200, 0.9, 0)])
            .aggregate(&s, 0.5)
            .unwrap();
        // Same physical point as full resolution
        assert_eq!(agg.center_list, vec![vec![-163.33, -70.0, 200.0]]);
    }

    #[test]
    fn test_decimated_depth_keeps_odd_pixel_fraction() {
        // Center (151, 151) lands between two decimated cells
        let boxes = vec![DetectionBox::new(101, 101, 201, 201, 0.9, 0)];
        let full = aggregator(boxes.clone()).aggregate(&sample(2.0), 0.5).unwrap();

        let intr = Intrinsics::pinhole(1280, 720, 600.0, 600.0, 640.0, 360.0).decimated(2);
        let mut s = sample(2.0);
        s.depth = Some(DepthFrame::flat(intr, 0.001, 2.0));
        let decimated = aggregator(boxes).aggregate(&s, 0.5).unwrap();

        assert_eq!(full.center_list, vec![vec![-163.0, -69.67, 200.0]]);
        assert_eq!(decimated.center_list, full.center_list);
    }

    #[test]
    fn test_invalid_threshold() {
        let err = aggregator(vec![]).aggregate(&sample(1.0), 1.5).unwrap_err();
        assert_eq!(err, DetectionError::InvalidThreshold(1.5));
    }
}
