// SPDX-License-Identifier: GPL-3.0-only

//! Decimation stage
//!
//! Shrinks the depth image by an integer factor. Small blocks (2x2, 3x3)
//! take the median of their non-zero samples, larger blocks the mean, so
//! holes never drag the result towards zero.

use super::{DepthStage, expect_encoding};
use crate::backends::camera::types::{DepthData, DepthEncoding, DepthFrame};
use crate::constants::filters::{MAX_DECIMATION_MAGNITUDE, MEDIAN_MAX_MAGNITUDE};
use crate::errors::{FilterError, FilterResult};

pub struct DecimationFilter {
    magnitude: u32,
    // Reused per block to avoid an allocation per output pixel
    scratch: Vec<u16>,
}

impl DecimationFilter {
    pub fn new(magnitude: u32) -> FilterResult<Self> {
        if !(1..=MAX_DECIMATION_MAGNITUDE).contains(&magnitude) {
            return Err(FilterError::InvalidParameter(format!(
                "decimation magnitude {} outside 1..={}",
                magnitude, MAX_DECIMATION_MAGNITUDE
            )));
        }
        let block = (magnitude * magnitude) as usize;
        Ok(Self {
            magnitude,
            scratch: Vec::with_capacity(block),
        })
    }

    pub fn magnitude(&self) -> u32 {
        self.magnitude
    }

    fn reduce_block(&mut self) -> u16 {
        if self.scratch.is_empty() {
            return 0;
        }
        if self.magnitude <= MEDIAN_MAX_MAGNITUDE {
            self.scratch.sort_unstable();
            self.scratch[self.scratch.len() / 2]
        } else {
            let sum: u32 = self.scratch.iter().map(|&v| v as u32).sum();
            (sum / self.scratch.len() as u32) as u16
        }
    }
}

impl DepthStage for DecimationFilter {
    fn name(&self) -> &'static str {
        "decimation"
    }

    fn process(&mut self, frame: DepthFrame) -> FilterResult<DepthFrame> {
        expect_encoding(&frame, self.name(), DepthEncoding::Z16)?;
        if self.magnitude == 1 {
            return Ok(frame);
        }

        let DepthData::Z16(ref input) = frame.data else {
            return Ok(frame);
        };

        let m = self.magnitude as usize;
        let in_w = frame.width as usize;
        let out_w = frame.width as usize / m;
        let out_h = frame.height as usize / m;
        let mut output = Vec::with_capacity(out_w * out_h);

        for oy in 0..out_h {
            for ox in 0..out_w {
                self.scratch.clear();
                for dy in 0..m {
                    let row = (oy * m + dy) * in_w + ox * m;
                    self.scratch
                        .extend(input[row..row + m].iter().copied().filter(|&v| v != 0));
                }
                output.push(self.reduce_block());
            }
        }

        Ok(DepthFrame {
            width: out_w as u32,
            height: out_h as u32,
            data: DepthData::Z16(output),
            intrinsics: frame.intrinsics.decimated(self.magnitude),
            depth_scale: frame.depth_scale,
            timestamp_ms: frame.timestamp_ms,
        })
    }
}
