// SPDX-License-Identifier: GPL-3.0-only

//! Edge-preserving spatial smoothing
//!
//! Recursive domain-transform filter: each pass walks a row or column and
//! blends a sample with its already-filtered predecessor, unless either is
//! a hole or the step between them is at least `delta` (an edge).

use super::{DepthStage, expect_encoding};
use crate::backends::camera::types::{DepthData, DepthEncoding, DepthFrame};
use crate::constants::filters::MAX_SPATIAL_ITERATIONS;
use crate::errors::{FilterError, FilterResult};

pub struct SpatialFilter {
    alpha: f32,
    delta: f32,
    iterations: u32,
}

impl SpatialFilter {
    pub fn new(alpha: f32, delta: f32, iterations: u32) -> FilterResult<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(FilterError::InvalidParameter(format!(
                "spatial alpha {} outside (0, 1]",
                alpha
            )));
        }
        if !(delta > 0.0) {
            return Err(FilterError::InvalidParameter(format!(
                "spatial delta must be positive, got {}",
                delta
            )));
        }
        if !(1..=MAX_SPATIAL_ITERATIONS).contains(&iterations) {
            return Err(FilterError::InvalidParameter(format!(
                "spatial iterations {} outside 1..={}",
                iterations, MAX_SPATIAL_ITERATIONS
            )));
        }
        Ok(Self {
            alpha,
            delta,
            iterations,
        })
    }

    #[inline]
    fn blend(&self, prev: f32, cur: f32) -> f32 {
        if prev > 0.0 && cur > 0.0 && (cur - prev).abs() < self.delta {
            self.alpha * cur + (1.0 - self.alpha) * prev
        } else {
            cur
        }
    }

    /// One recursive pass over `len` samples starting at `start`, `stride` apart
    fn sweep(&self, data: &mut [f32], start: usize, len: usize, stride: isize) {
        if len < 2 {
            return;
        }
        let mut idx = start as isize;
        let mut prev = data[start];
        for _ in 1..len {
            idx += stride;
            let i = idx as usize;
            let filtered = self.blend(prev, data[i]);
            data[i] = filtered;
            prev = filtered;
        }
    }

    fn smooth(&self, data: &mut [f32], width: usize, height: usize) {
        for _ in 0..self.iterations {
            for y in 0..height {
                let row = y * width;
                self.sweep(data, row, width, 1);
                self.sweep(data, row + width - 1, width, -1);
            }
            for x in 0..width {
                self.sweep(data, x, height, width as isize);
                self.sweep(data, (height - 1) * width + x, height, -(width as isize));
            }
        }
    }
}

impl DepthStage for SpatialFilter {
    fn name(&self) -> &'static str {
        "spatial"
    }

    fn process(&mut self, mut frame: DepthFrame) -> FilterResult<DepthFrame> {
        expect_encoding(&frame, self.name(), DepthEncoding::Disparity)?;
        let (width, height) = (frame.width as usize, frame.height as usize);
        if width == 0 || height == 0 {
            return Ok(frame);
        }
        if let DepthData::Disparity(ref mut data) = frame.data {
            self.smooth(data, width, height);
        }
        Ok(frame)
    }
}
