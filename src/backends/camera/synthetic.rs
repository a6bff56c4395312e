// SPDX-License-Identifier: GPL-3.0-only

//! Procedural depth sensor
//!
//! Renders a fixed scene: a gray backdrop with a few colored blocks, seen
//! by a depth camera looking at a flat wall. Used when no hardware is
//! attached and by the test suite.

use super::DepthSensor;
use super::types::*;
use std::time::Duration;
use tracing::{debug, info};

/// Horizontal field of view factor: fx = width * FOCAL_FACTOR
const FOCAL_FACTOR: f64 = 600.0 / 1280.0;

/// Blocks drawn into the color image (x, y, w, h in 1280x720 space, RGB)
const BLOCKS: &[(u32, u32, u32, u32, [u8; 3])] = &[
    (100, 100, 100, 100, [200, 40, 40]),
    (300, 50, 100, 100, [40, 40, 200]),
    (800, 400, 160, 120, [230, 200, 30]),
];

pub struct SyntheticSensor {
    profile: Option<StreamProfile>,
    distance_m: f32,
    depth_scale: f32,
    drop_every: u32,
    pace: bool,
    frame_index: u64,
}

impl SyntheticSensor {
    pub fn new() -> Self {
        Self {
            profile: None,
            distance_m: 2.0,
            depth_scale: crate::constants::stream::DEPTH_SCALE,
            drop_every: 0,
            pace: true,
            frame_index: 0,
        }
    }

    /// Distance of the flat wall in meters
    pub fn with_distance(mut self, meters: f32) -> Self {
        self.distance_m = meters;
        self
    }

    /// Drop the depth frame of every Nth poll (0 = never)
    pub fn with_drop_every(mut self, n: u32) -> Self {
        self.drop_every = n;
        self
    }

    /// Deliver frames as fast as they are requested
    pub fn unpaced(mut self) -> Self {
        self.pace = false;
        self
    }

    fn stream_intrinsics(width: u32, height: u32) -> Intrinsics {
        Intrinsics::pinhole(
            width,
            height,
            width as f64 * FOCAL_FACTOR,
            width as f64 * FOCAL_FACTOR,
            width as f64 / 2.0,
            height as f64 / 2.0,
        )
    }

    fn render_color(width: u32, height: u32) -> ColorImage {
        let sx = width as f64 / 1280.0;
        let sy = height as f64 / 720.0;
        let mut img = ColorImage::from_pixel(width, height, image::Rgb([64, 64, 64]));
        for &(bx, by, bw, bh, rgb) in BLOCKS {
            let x0 = (bx as f64 * sx) as u32;
            let y0 = (by as f64 * sy) as u32;
            let x1 = (((bx + bw) as f64 * sx) as u32).min(width);
            let y1 = (((by + bh) as f64 * sy) as u32).min(height);
            for y in y0..y1 {
                for x in x0..x1 {
                    img.put_pixel(x, y, image::Rgb(rgb));
                }
            }
        }
        img
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl DepthSensor for SyntheticSensor {
    fn open(&mut self, profile: &StreamProfile) -> SensorResult<()> {
        if profile.color_width == 0 || profile.color_height == 0 || profile.fps == 0 {
            return Err(SensorError::UnsupportedProfile(profile.to_string()));
        }
        info!(profile = %profile, distance_m = self.distance_m, "Synthetic sensor opened");
        self.profile = Some(*profile);
        self.frame_index = 0;
        Ok(())
    }

    fn close(&mut self) {
        if self.profile.take().is_some() {
            debug!(frames = self.frame_index, "Synthetic sensor closed");
        }
    }

    fn is_open(&self) -> bool {
        self.profile.is_some()
    }

    fn depth_scale(&self) -> SensorResult<f32> {
        self.profile.ok_or(SensorError::NotOpen)?;
        Ok(self.depth_scale)
    }

    fn intrinsics(&self, stream: StreamKind) -> SensorResult<Intrinsics> {
        let profile = self.profile.ok_or(SensorError::NotOpen)?;
        Ok(match stream {
            StreamKind::Color => Self::stream_intrinsics(profile.color_width, profile.color_height),
            StreamKind::Depth => Self::stream_intrinsics(profile.depth_width, profile.depth_height),
        })
    }

    fn depth_to_color(&self) -> SensorResult<Extrinsics> {
        self.profile.ok_or(SensorError::NotOpen)?;
        Ok(Extrinsics::identity())
    }

    fn wait_for_frames(&mut self, timeout: Duration) -> SensorResult<RawFramePair> {
        let profile = self.profile.ok_or(SensorError::NotOpen)?;
        if self.pace {
            let period = Duration::from_secs_f64(1.0 / profile.fps as f64);
            std::thread::sleep(period.min(timeout));
        }

        self.frame_index += 1;
        let timestamp_ms = self.frame_index as f64 * 1000.0 / profile.fps as f64;

        let color = Self::render_color(profile.color_width, profile.color_height);
        let dropped = self.drop_every > 0 && self.frame_index % self.drop_every as u64 == 0;
        let depth = if dropped {
            debug!(frame = self.frame_index, "Synthetic sensor dropping depth frame");
            None
        } else {
            let intr = self.intrinsics(StreamKind::Depth)?;
            Some(DepthFrame::flat(intr, self.depth_scale, self.distance_m).with_timestamp(timestamp_ms))
        };

        Ok(RawFramePair {
            color: Some(color),
            depth,
            timestamp_ms,
        })
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
