// SPDX-License-Identifier: GPL-3.0-only

//! Depth <-> disparity conversion
//!
//! Smoothing is done in disparity space where noise is roughly uniform
//! across the working range. Disparity is stored in 1/32 pixel units:
//! `d = baseline * fx * 32 / z` with `z` and `baseline` in meters.

use super::{DepthStage, expect_encoding};
use crate::backends::camera::types::{DepthData, DepthEncoding, DepthFrame};
use crate::constants::filters::DISPARITY_SUBPIXEL;
use crate::errors::{FilterError, FilterResult};

/// Conversion direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ToDisparity,
    ToDepth,
}

pub struct DisparityTransform {
    direction: Direction,
    baseline_m: f32,
}

impl DisparityTransform {
    pub fn new(direction: Direction, baseline_m: f32) -> FilterResult<Self> {
        if !baseline_m.is_finite() || baseline_m <= 0.0 {
            return Err(FilterError::InvalidParameter(format!(
                "stereo baseline must be positive, got {}",
                baseline_m
            )));
        }
        Ok(Self {
            direction,
            baseline_m,
        })
    }

    pub fn to_disparity(baseline_m: f32) -> FilterResult<Self> {
        Self::new(Direction::ToDisparity, baseline_m)
    }

    pub fn to_depth(baseline_m: f32) -> FilterResult<Self> {
        Self::new(Direction::ToDepth, baseline_m)
    }

    // Same factor both ways: d = k / z_units and z_units = k / d
    fn factor(&self, frame: &DepthFrame) -> f32 {
        self.baseline_m * frame.intrinsics.fx as f32 * DISPARITY_SUBPIXEL / frame.depth_scale
    }
}

impl DepthStage for DisparityTransform {
    fn name(&self) -> &'static str {
        match self.direction {
            Direction::ToDisparity => "depth-to-disparity",
            Direction::ToDepth => "disparity-to-depth",
        }
    }

    fn process(&mut self, mut frame: DepthFrame) -> FilterResult<DepthFrame> {
        let expected = match self.direction {
            Direction::ToDisparity => DepthEncoding::Z16,
            Direction::ToDepth => DepthEncoding::Disparity,
        };
        expect_encoding(&frame, self.name(), expected)?;
        if frame.depth_scale <= 0.0 {
            return Err(FilterError::InvalidParameter(format!(
                "depth scale must be positive, got {}",
                frame.depth_scale
            )));
        }

        let k = self.factor(&frame);
        frame.data = match std::mem::replace(&mut frame.data, DepthData::Z16(Vec::new())) {
            DepthData::Z16(units) => DepthData::Disparity(
                units
                    .into_iter()
                    .map(|z| if z == 0 { 0.0 } else { k / z as f32 })
                    .collect(),
            ),
            DepthData::Disparity(disp) => DepthData::Z16(
                disp.into_iter()
                    .map(|d| {
                        if d <= 0.0 {
                            0
                        } else {
                            (k / d).round().min(u16::MAX as f32) as u16
                        }
                    })
                    .collect(),
            ),
        };
        Ok(frame)
    }
}
