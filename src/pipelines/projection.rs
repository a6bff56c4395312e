// SPDX-License-Identifier: GPL-3.0-only

//! Pixel <-> camera-frame point conversion
//!
//! Camera optical frame: X right, Y down, Z forward, meters.

use crate::backends::camera::types::{DepthFrame, DistortionModel, Intrinsics};
use serde::{Deserialize, Serialize};

/// Iterations used to invert forward Brown-Conrady distortion
const UNDISTORT_ITERATIONS: usize = 10;

/// 3D point in the camera optical frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpatialPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl SpatialPoint {
    pub const ZERO: SpatialPoint = SpatialPoint {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Coordinates in centimeters, rounded to 2 decimals
    pub fn to_centimeters(&self) -> [f64; 3] {
        [
            to_centimeters(self.x),
            to_centimeters(self.y),
            to_centimeters(self.z),
        ]
    }
}

/// Result of looking up a single pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deprojection {
    /// Distance read at the pixel in meters (0.0 = no data)
    pub depth_m: f64,
    /// Zero vector when there was no depth
    pub point: SpatialPoint,
}

impl Deprojection {
    pub fn is_valid(&self) -> bool {
        self.depth_m > 0.0
    }
}

/// Meters to centimeters rounded to 2 decimal places
pub fn to_centimeters(meters: f64) -> f64 {
    (meters * 100.0 * 100.0).round() / 100.0
}

/// Inverse camera model: pixel + distance -> point
///
/// Depth of zero (or anything not finite) yields the zero vector.
pub fn deproject_pixel_to_point(intr: &Intrinsics, pixel: [f64; 2], depth_m: f64) -> SpatialPoint {
    if !(depth_m.is_finite() && depth_m > 0.0) {
        return SpatialPoint::ZERO;
    }

    let mut x = (pixel[0] - intr.ppx) / intr.fx;
    let mut y = (pixel[1] - intr.ppy) / intr.fy;
    let c = &intr.coeffs;

    match intr.model {
        DistortionModel::None | DistortionModel::ModifiedBrownConrady => {}
        DistortionModel::InverseBrownConrady => {
            let r2 = x * x + y * y;
            let f = 1.0 + c[0] * r2 + c[1] * r2 * r2 + c[4] * r2 * r2 * r2;
            let ux = x * f + 2.0 * c[2] * x * y + c[3] * (r2 + 2.0 * x * x);
            let uy = y * f + 2.0 * c[3] * x * y + c[2] * (r2 + 2.0 * y * y);
            x = ux;
            y = uy;
        }
        DistortionModel::BrownConrady => {
            let (xd, yd) = (x, y);
            for _ in 0..UNDISTORT_ITERATIONS {
                let r2 = x * x + y * y;
                let icdist = 1.0 / (1.0 + ((c[4] * r2 + c[1]) * r2 + c[0]) * r2);
                let dx = 2.0 * c[2] * x * y + c[3] * (r2 + 2.0 * x * x);
                let dy = 2.0 * c[3] * x * y + c[2] * (r2 + 2.0 * y * y);
                x = (xd - dx) * icdist;
                y = (yd - dy) * icdist;
            }
        }
    }

    SpatialPoint::new(depth_m * x, depth_m * y, depth_m)
}

/// Forward camera model: point -> pixel
///
/// Returns `None` for points at or behind the image plane.
pub fn project_point_to_pixel(intr: &Intrinsics, point: [f64; 3]) -> Option<[f64; 2]> {
    if point[2] <= 0.0 {
        return None;
    }
    let mut x = point[0] / point[2];
    let mut y = point[1] / point[2];
    let c = &intr.coeffs;

    match intr.model {
        DistortionModel::BrownConrady | DistortionModel::ModifiedBrownConrady => {
            let r2 = x * x + y * y;
            let f = 1.0 + c[0] * r2 + c[1] * r2 * r2 + c[4] * r2 * r2 * r2;
            let xf = x * f;
            let yf = y * f;
            let dx = xf + 2.0 * c[2] * x * y + c[3] * (r2 + 2.0 * x * x);
            let dy = yf + 2.0 * c[3] * x * y + c[2] * (r2 + 2.0 * y * y);
            x = dx;
            y = dy;
        }
        DistortionModel::None | DistortionModel::InverseBrownConrady => {}
    }

    Some([x * intr.fx + intr.ppx, y * intr.fy + intr.ppy])
}

/// Look up the depth at a pixel and deproject it
///
/// Depth is read from the pixel containing `(x, y)`, clamped to the
/// nearest edge pixel when outside the frame. The ray goes through the
/// exact requested position, fraction included.
pub fn deproject(frame: &DepthFrame, intr: &Intrinsics, x: f64, y: f64) -> Deprojection {
    if frame.width == 0 || frame.height == 0 {
        return Deprojection {
            depth_m: 0.0,
            point: SpatialPoint::ZERO,
        };
    }
    let cx = (x.floor() as i64).clamp(0, frame.width as i64 - 1) as u32;
    let cy = (y.floor() as i64).clamp(0, frame.height as i64 - 1) as u32;
    let depth_m = frame.distance_at(cx, cy);
    Deprojection {
        depth_m,
        point: deproject_pixel_to_point(intr, [x, y], depth_m),
    }
}
