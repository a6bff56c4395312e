// SPDX-License-Identifier: GPL-3.0-only

//! Temporal smoothing with hole persistence
//!
//! Keeps the last valid value of every pixel plus an 8-frame validity
//! history (bit 0 = current frame). Valid samples close to the remembered
//! value are blended with it. Holes are filled from memory when the
//! persistence mode accepts the pixel's history.

use super::{DepthStage, expect_encoding};
use crate::backends::camera::types::{DepthData, DepthEncoding, DepthFrame};
use crate::constants::PersistenceMode;
use crate::errors::{FilterError, FilterResult};
use tracing::debug;

pub struct TemporalFilter {
    alpha: f32,
    delta: f32,
    persistence: PersistenceMode,
    last: Vec<f32>,
    history: Vec<u8>,
    dims: (u32, u32),
}

impl TemporalFilter {
    pub fn new(alpha: f32, delta: f32, persistence: PersistenceMode) -> FilterResult<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(FilterError::InvalidParameter(format!(
                "temporal alpha {} outside (0, 1]",
                alpha
            )));
        }
        if !(delta > 0.0) {
            return Err(FilterError::InvalidParameter(format!(
                "temporal delta must be positive, got {}",
                delta
            )));
        }
        Ok(Self {
            alpha,
            delta,
            persistence,
            last: Vec::new(),
            history: Vec::new(),
            dims: (0, 0),
        })
    }

    /// Forget all remembered values
    pub fn reset(&mut self) {
        self.last.clear();
        self.history.clear();
        self.dims = (0, 0);
    }

    fn ensure_state(&mut self, width: u32, height: u32) {
        if self.dims == (width, height) {
            return;
        }
        if self.dims != (0, 0) {
            debug!(
                old_width = self.dims.0,
                old_height = self.dims.1,
                width,
                height,
                "Resolution changed, resetting temporal history"
            );
        }
        let len = width as usize * height as usize;
        self.last = vec![0.0; len];
        self.history = vec![0; len];
        self.dims = (width, height);
    }

    fn smooth(&mut self, data: &mut [f32]) {
        for ((cur, last), hist) in data
            .iter_mut()
            .zip(self.last.iter_mut())
            .zip(self.history.iter_mut())
        {
            if *cur > 0.0 {
                if *last > 0.0 && (*cur - *last).abs() < self.delta {
                    *cur = self.alpha * *cur + (1.0 - self.alpha) * *last;
                }
                *last = *cur;
                *hist = (*hist << 1) | 1;
            } else {
                *hist <<= 1;
                if *last > 0.0 && self.persistence.accepts(*hist) {
                    *cur = *last;
                }
            }
        }
    }
}

impl DepthStage for TemporalFilter {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn process(&mut self, mut frame: DepthFrame) -> FilterResult<DepthFrame> {
        expect_encoding(&frame, self.name(), DepthEncoding::Disparity)?;
        self.ensure_state(frame.width, frame.height);
        if let DepthData::Disparity(ref mut data) = frame.data {
            self.smooth(data);
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::Intrinsics;

    fn disparity(values: Vec<f32>) -> DepthFrame {
        let width = values.len() as u32;
        DepthFrame {
            width,
            height: 1,
            data: DepthData::Disparity(values),
            intrinsics: Intrinsics::pinhole(width, 1, 1.0, 1.0, 0.0, 0.0),
            depth_scale: 0.001,
            timestamp_ms: 0.0,
        }
    }

    fn first(frame: &DepthFrame) -> f32 {
        match &frame.data {
            DepthData::Disparity(v) => v[0],
            DepthData::Z16(_) => panic!("expected disparity"),
        }
    }

    #[test]
    fn test_blends_towards_history() {
        let mut filter = TemporalFilter::new(0.4, 20.0, PersistenceMode::default()).unwrap();
        filter.process(disparity(vec![100.0])).unwrap();
        let out = filter.process(disparity(vec![110.0])).unwrap();
        // 0.4 * 110 + 0.6 * 100
        assert!((first(&out) - 104.0).abs() < 1e-4);
    }

    #[test]
    fn test_large_jump_not_blended() {
        let mut filter = TemporalFilter::new(0.4, 20.0, PersistenceMode::default()).unwrap();
        filter.process(disparity(vec![100.0])).unwrap();
        let out = filter.process(disparity(vec![200.0])).unwrap();
        assert_eq!(first(&out), 200.0);
    }

    #[test]
    fn test_hole_filled_by_persistence() {
        let mut filter = TemporalFilter::new(0.4, 20.0, PersistenceMode::Valid2of4).unwrap();
        filter.process(disparity(vec![100.0])).unwrap();
        // One valid frame in the window is not enough
        let out = filter.process(disparity(vec![0.0])).unwrap();
        assert_eq!(first(&out), 0.0);

        filter.reset();
        filter.process(disparity(vec![100.0])).unwrap();
        filter.process(disparity(vec![100.0])).unwrap();
        let out = filter.process(disparity(vec![0.0])).unwrap();
        assert_eq!(first(&out), 100.0);
    }

    #[test]
    fn test_disabled_never_fills() {
        let mut filter = TemporalFilter::new(0.4, 20.0, PersistenceMode::Disabled).unwrap();
        for _ in 0..8 {
            filter.process(disparity(vec![100.0])).unwrap();
        }
        let out = filter.process(disparity(vec![0.0])).unwrap();
        assert_eq!(first(&out), 0.0);
    }

    #[test]
    fn test_resolution_change_resets_history() {
        let mut filter = TemporalFilter::new(0.4, 20.0, PersistenceMode::AlwaysOn).unwrap();
        filter.process(disparity(vec![100.0])).unwrap();
        let out = filter.process(disparity(vec![0.0, 0.0])).unwrap();
        assert_eq!(first(&out), 0.0);
    }
}
