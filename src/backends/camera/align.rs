// SPDX-License-Identifier: GPL-3.0-only

//! Depth-to-color alignment
//!
//! Reprojects every depth pixel into the color camera so that depth and
//! color share one pixel grid. Each depth pixel covers the color pixels
//! between its projected top-left and bottom-right corners; where several
//! depth pixels land on the same color pixel the nearest one wins.

use super::types::{DepthData, DepthEncoding, DepthFrame, Extrinsics, Intrinsics};
use crate::errors::{FilterError, FilterResult};
use crate::pipelines::projection::{deproject_pixel_to_point, project_point_to_pixel};

/// Aligns depth frames into the color viewpoint of one session
#[derive(Debug, Clone)]
pub struct DepthAligner {
    depth: Intrinsics,
    color: Intrinsics,
    depth_to_color: Extrinsics,
}

impl DepthAligner {
    pub fn new(depth: Intrinsics, color: Intrinsics, depth_to_color: Extrinsics) -> Self {
        Self {
            depth,
            color,
            depth_to_color,
        }
    }

    /// Both streams already share one viewpoint and pixel grid
    pub fn is_passthrough(&self) -> bool {
        self.depth == self.color && self.depth_to_color.is_identity()
    }

    pub fn align(&self, frame: DepthFrame) -> FilterResult<DepthFrame> {
        let Some(samples) = frame.samples() else {
            return Err(FilterError::UnexpectedEncoding {
                stage: "align",
                expected: DepthEncoding::Z16,
                found: frame.encoding(),
            });
        };
        if self.is_passthrough() {
            return Ok(frame);
        }

        let (dw, dh) = (frame.width as usize, frame.height as usize);
        let (cw, ch) = (self.color.width as i64, self.color.height as i64);
        let mut aligned = vec![0u16; self.color.pixel_count()];
        let scale = frame.depth_scale as f64;

        for y in 0..dh {
            for x in 0..dw {
                let raw = samples[y * dw + x];
                if raw == 0 {
                    continue;
                }
                let meters = raw as f64 * scale;

                let Some(top_left) = self.corner(x as f64 - 0.5, y as f64 - 0.5, meters) else {
                    continue;
                };
                let Some(bottom_right) = self.corner(x as f64 + 0.5, y as f64 + 0.5, meters)
                else {
                    continue;
                };

                let (x0, y0) = (top_left[0], top_left[1]);
                let (x1, y1) = (bottom_right[0], bottom_right[1]);
                if x0 < 0 || y0 < 0 || x1 >= cw || y1 >= ch {
                    continue;
                }

                for cy in y0..=y1 {
                    for cx in x0..=x1 {
                        let slot = &mut aligned[(cy * cw + cx) as usize];
                        if *slot == 0 || raw < *slot {
                            *slot = raw;
                        }
                    }
                }
            }
        }

        Ok(DepthFrame {
            width: self.color.width,
            height: self.color.height,
            data: DepthData::Z16(aligned),
            intrinsics: self.color,
            depth_scale: frame.depth_scale,
            timestamp_ms: frame.timestamp_ms,
        })
    }

    // Depth pixel corner -> nearest color pixel
    fn corner(&self, px: f64, py: f64, meters: f64) -> Option<[i64; 2]> {
        let point = deproject_pixel_to_point(&self.depth, [px, py], meters);
        let in_color = self.depth_to_color.transform(point.as_array());
        let pixel = project_point_to_pixel(&self.color, in_color)?;
        Some([(pixel[0] + 0.5) as i64, (pixel[1] + 0.5) as i64])
    }
}
