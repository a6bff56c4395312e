// SPDX-License-Identifier: GPL-3.0-only

//! Depth post-processing chain
//!
//! Runs the fixed stage order every frame:
//!
//! ```text
//! Z16 ─► decimation ─► depth→disparity ─► spatial ─► temporal ─► disparity→depth ─► Z16
//! ```
//!
//! The pipeline is created once per sensor session and reused, because the
//! temporal stage keeps per-pixel history between frames.

pub mod decimation;
pub mod disparity;
pub mod spatial;
pub mod temporal;

pub use decimation::DecimationFilter;
pub use disparity::{Direction, DisparityTransform};
pub use spatial::SpatialFilter;
pub use temporal::TemporalFilter;

use crate::backends::camera::types::{DepthEncoding, DepthFrame};
use crate::constants::{PersistenceMode, filters};
use crate::errors::{FilterError, FilterResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One transform in the filter chain
pub trait DepthStage: Send {
    /// Stage name used in errors and logs
    fn name(&self) -> &'static str;

    /// Transform one frame
    fn process(&mut self, frame: DepthFrame) -> FilterResult<DepthFrame>;
}

/// Fail with `UnexpectedEncoding` unless the frame is in `expected`
pub(crate) fn expect_encoding(
    frame: &DepthFrame,
    stage: &'static str,
    expected: DepthEncoding,
) -> FilterResult<()> {
    let found = frame.encoding();
    if found != expected {
        return Err(FilterError::UnexpectedEncoding {
            stage,
            expected,
            found,
        });
    }
    Ok(())
}

/// Tunables for the filter chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthFilterSettings {
    pub decimation_magnitude: u32,
    pub spatial_alpha: f32,
    pub spatial_delta: f32,
    pub spatial_iterations: u32,
    pub temporal_alpha: f32,
    pub temporal_delta: f32,
    pub persistence: PersistenceMode,
}

impl Default for DepthFilterSettings {
    fn default() -> Self {
        Self {
            decimation_magnitude: filters::DECIMATION_MAGNITUDE,
            spatial_alpha: filters::SPATIAL_ALPHA,
            spatial_delta: filters::SPATIAL_DELTA,
            spatial_iterations: filters::SPATIAL_ITERATIONS,
            temporal_alpha: filters::TEMPORAL_ALPHA,
            temporal_delta: filters::TEMPORAL_DELTA,
            persistence: PersistenceMode::default(),
        }
    }
}

impl DepthFilterSettings {
    /// Check every parameter by building the stages once
    pub fn validate(&self) -> FilterResult<()> {
        DepthFilterPipeline::new(self, crate::constants::stream::STEREO_BASELINE_M).map(|_| ())
    }
}

/// Long-lived filter chain for one depth stream
pub struct DepthFilterPipeline {
    decimation: DecimationFilter,
    to_disparity: DisparityTransform,
    spatial: SpatialFilter,
    temporal: TemporalFilter,
    to_depth: DisparityTransform,
    frames: u64,
}

impl DepthFilterPipeline {
    pub fn new(settings: &DepthFilterSettings, baseline_m: f32) -> FilterResult<Self> {
        debug!(
            magnitude = settings.decimation_magnitude,
            persistence = settings.persistence.display_name(),
            "Building depth filter pipeline"
        );
        Ok(Self {
            decimation: DecimationFilter::new(settings.decimation_magnitude)?,
            to_disparity: DisparityTransform::to_disparity(baseline_m)?,
            spatial: SpatialFilter::new(
                settings.spatial_alpha,
                settings.spatial_delta,
                settings.spatial_iterations,
            )?,
            temporal: TemporalFilter::new(
                settings.temporal_alpha,
                settings.temporal_delta,
                settings.persistence,
            )?,
            to_depth: DisparityTransform::to_depth(baseline_m)?,
            frames: 0,
        })
    }

    /// Run the full chain on one raw depth frame
    pub fn filter(&mut self, frame: DepthFrame) -> FilterResult<DepthFrame> {
        let expected = frame.width as usize * frame.height as usize;
        if frame.data.len() != expected {
            return Err(FilterError::DimensionMismatch {
                expected,
                found: frame.data.len(),
            });
        }

        let frame = self.decimation.process(frame)?;
        let frame = self.to_disparity.process(frame)?;
        let frame = self.spatial.process(frame)?;
        let frame = self.temporal.process(frame)?;
        let frame = self.to_depth.process(frame)?;

        self.frames += 1;
        if self.frames == 1 {
            info!(
                width = frame.width,
                height = frame.height,
                magnitude = self.decimation.magnitude(),
                "Depth filter pipeline produced first frame"
            );
        }
        Ok(frame)
    }

    /// Drop temporal history (next frame starts fresh)
    pub fn reset(&mut self) {
        debug!("Resetting depth filter pipeline");
        self.temporal.reset();
        self.frames = 0;
    }

    /// Number of frames filtered since construction or the last reset
    pub fn frames_processed(&self) -> u64 {
        self.frames
    }
}
