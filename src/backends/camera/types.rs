// SPDX-License-Identifier: GPL-3.0-only
// Shared types for depth sensor backends

//! Shared types for depth sensor backends

use serde::{Deserialize, Serialize};

/// Color image type used throughout the pipeline (8-bit RGB, row-major)
pub type ColorImage = image::RgbImage;

/// Stream selector for per-stream sensor queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Color,
    Depth,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Color => write!(f, "color"),
            StreamKind::Depth => write!(f, "depth"),
        }
    }
}

/// Lens distortion model reported by the sensor
///
/// Coefficient order follows the usual `[k1, k2, p1, p2, k3]` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistortionModel {
    /// Ideal pinhole, coefficients ignored
    #[default]
    None,
    /// Forward Brown-Conrady; deprojection has to iterate
    BrownConrady,
    /// Inverse Brown-Conrady; deprojection is closed form
    InverseBrownConrady,
    /// Brown-Conrady applied after normalization (projection only)
    ModifiedBrownConrady,
}

/// Per-stream camera intrinsics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Stream width in pixels
    pub width: u32,
    /// Stream height in pixels
    pub height: u32,
    /// Focal length X (pixels)
    pub fx: f64,
    /// Focal length Y (pixels)
    pub fy: f64,
    /// Principal point X (pixels)
    pub ppx: f64,
    /// Principal point Y (pixels)
    pub ppy: f64,
    #[serde(default)]
    pub model: DistortionModel,
    #[serde(default)]
    pub coeffs: [f64; 5],
}

impl Intrinsics {
    /// Distortion-free intrinsics
    pub fn pinhole(width: u32, height: u32, fx: f64, fy: f64, ppx: f64, ppy: f64) -> Self {
        Self {
            width,
            height,
            fx,
            fy,
            ppx,
            ppy,
            model: DistortionModel::None,
            coeffs: [0.0; 5],
        }
    }

    /// Intrinsics of a stream decimated by an integer factor
    ///
    /// Resolution is floored the same way the decimated pixel grid is.
    pub fn decimated(&self, magnitude: u32) -> Self {
        if magnitude <= 1 {
            return *self;
        }
        let m = magnitude as f64;
        Self {
            width: self.width / magnitude,
            height: self.height / magnitude,
            fx: self.fx / m,
            fy: self.fy / m,
            ppx: self.ppx / m,
            ppy: self.ppy / m,
            model: self.model,
            coeffs: self.coeffs,
        }
    }

    /// Number of pixels in the stream
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Rigid transform between two sensor streams (meters)
///
/// `rotation` is column-major 3x3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    pub rotation: [f64; 9],
    pub translation: [f64; 3],
}

impl Extrinsics {
    pub fn identity() -> Self {
        Self {
            rotation: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            translation: [0.0; 3],
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Apply the transform to a point
    pub fn transform(&self, p: [f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        let t = &self.translation;
        [
            r[0] * p[0] + r[3] * p[1] + r[6] * p[2] + t[0],
            r[1] * p[0] + r[4] * p[1] + r[7] * p[2] + t[1],
            r[2] * p[0] + r[5] * p[1] + r[8] * p[2] + t[2],
        ]
    }
}

impl Default for Extrinsics {
    fn default() -> Self {
        Self::identity()
    }
}

/// Requested stream configuration for a sensor session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamProfile {
    pub color_width: u32,
    pub color_height: u32,
    pub depth_width: u32,
    pub depth_height: u32,
    pub fps: u32,
}

impl Default for StreamProfile {
    fn default() -> Self {
        use crate::constants::stream;
        Self {
            color_width: stream::WIDTH,
            color_height: stream::HEIGHT,
            depth_width: stream::WIDTH,
            depth_height: stream::HEIGHT,
            fps: stream::FPS,
        }
    }
}

impl std::fmt::Display for StreamProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "color {}x{} + depth {}x{} @ {}fps",
            self.color_width, self.color_height, self.depth_width, self.depth_height, self.fps
        )
    }
}

/// Encoding of the samples held by a depth frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthEncoding {
    /// Distance in sensor units (multiply by depth scale for meters)
    Z16,
    /// Disparity in 1/32 subpixel units
    Disparity,
}

impl std::fmt::Display for DepthEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepthEncoding::Z16 => write!(f, "Z16"),
            DepthEncoding::Disparity => write!(f, "disparity"),
        }
    }
}

/// Depth sample storage
#[derive(Clone)]
pub enum DepthData {
    Z16(Vec<u16>),
    Disparity(Vec<f32>),
}

impl DepthData {
    pub fn encoding(&self) -> DepthEncoding {
        match self {
            DepthData::Z16(_) => DepthEncoding::Z16,
            DepthData::Disparity(_) => DepthEncoding::Disparity,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DepthData::Z16(v) => v.len(),
            DepthData::Disparity(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DepthData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepthData::Z16(v) => write!(f, "DepthData::Z16({} samples)", v.len()),
            DepthData::Disparity(v) => write!(f, "DepthData::Disparity({} samples)", v.len()),
        }
    }
}

/// A single depth frame together with the stream geometry it belongs to
///
/// The intrinsics travel with the frame so that stages changing the
/// resolution (decimation, alignment) hand the updated geometry downstream.
#[derive(Debug, Clone)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    pub data: DepthData,
    pub intrinsics: Intrinsics,
    /// Meters per Z16 unit
    pub depth_scale: f32,
    /// Sensor timestamp in milliseconds
    pub timestamp_ms: f64,
}

impl DepthFrame {
    /// Build a Z16 frame, checking the sample count against the dimensions
    pub fn z16(
        width: u32,
        height: u32,
        samples: Vec<u16>,
        intrinsics: Intrinsics,
        depth_scale: f32,
    ) -> SensorResult<Self> {
        let expected = width as usize * height as usize;
        if samples.len() != expected {
            return Err(SensorError::InvalidFrame(format!(
                "depth frame {}x{} needs {} samples, got {}",
                width,
                height,
                expected,
                samples.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data: DepthData::Z16(samples),
            intrinsics,
            depth_scale,
            timestamp_ms: 0.0,
        })
    }

    /// Constant-distance frame, mostly useful for synthetic scenes
    pub fn flat(intrinsics: Intrinsics, depth_scale: f32, meters: f32) -> Self {
        let units = meters_to_units(meters, depth_scale);
        Self {
            width: intrinsics.width,
            height: intrinsics.height,
            data: DepthData::Z16(vec![units; intrinsics.pixel_count()]),
            intrinsics,
            depth_scale,
            timestamp_ms: 0.0,
        }
    }

    pub fn with_timestamp(mut self, timestamp_ms: f64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn encoding(&self) -> DepthEncoding {
        self.data.encoding()
    }

    /// Z16 samples, if the frame is in distance encoding
    pub fn samples(&self) -> Option<&[u16]> {
        match &self.data {
            DepthData::Z16(v) => Some(v),
            DepthData::Disparity(_) => None,
        }
    }

    /// Raw Z16 value at a pixel (`None` when out of bounds or not Z16)
    pub fn raw_at(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.samples()?.get(idx).copied()
    }

    /// Distance in meters at a pixel; 0.0 for missing data
    pub fn distance_at(&self, x: u32, y: u32) -> f64 {
        self.raw_at(x, y)
            .map(|raw| raw as f64 * self.depth_scale as f64)
            .unwrap_or(0.0)
    }
}

/// Convert meters to Z16 units, saturating at the representable range
pub fn meters_to_units(meters: f32, depth_scale: f32) -> u16 {
    if meters <= 0.0 || depth_scale <= 0.0 {
        return 0;
    }
    (meters / depth_scale).round().clamp(0.0, u16::MAX as f32) as u16
}

/// One poll of the sensor: either stream may be missing on desync
#[derive(Debug, Clone)]
pub struct RawFramePair {
    pub color: Option<ColorImage>,
    pub depth: Option<DepthFrame>,
    pub timestamp_ms: f64,
}

/// Result type for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;

/// Error types for sensor operations
#[derive(Debug, Clone)]
pub enum SensorError {
    /// Session has not been opened
    NotOpen,
    /// No frame arrived within the wait bound
    Timeout,
    /// Device went away during streaming
    Disconnected(String),
    /// Requested profile cannot be served
    UnsupportedProfile(String),
    /// Frame payload does not match its declared geometry
    InvalidFrame(String),
    /// Backing file or device I/O failed
    IoError(String),
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::NotOpen => write!(f, "Sensor session is not open"),
            SensorError::Timeout => write!(f, "Timed out waiting for frames"),
            SensorError::Disconnected(msg) => write!(f, "Sensor disconnected: {}", msg),
            SensorError::UnsupportedProfile(msg) => write!(f, "Unsupported profile: {}", msg),
            SensorError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            SensorError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        SensorError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimated_intrinsics() {
        let intr = Intrinsics::pinhole(1280, 720, 600.0, 600.0, 640.0, 360.0);
        let half = intr.decimated(2);
        assert_eq!((half.width, half.height), (640, 360));
        assert_eq!(half.fx, 300.0);
        assert_eq!(half.ppy, 180.0);

        // Magnitude 1 is a no-op
        assert_eq!(intr.decimated(1), intr);
    }

    #[test]
    fn test_z16_rejects_wrong_length() {
        let intr = Intrinsics::pinhole(4, 4, 1.0, 1.0, 2.0, 2.0);
        assert!(DepthFrame::z16(4, 4, vec![0; 15], intr, 0.001).is_err());
        assert!(DepthFrame::z16(4, 4, vec![0; 16], intr, 0.001).is_ok());
    }

    #[test]
    fn test_distance_at() {
        let intr = Intrinsics::pinhole(2, 2, 1.0, 1.0, 1.0, 1.0);
        let frame = DepthFrame::z16(2, 2, vec![0, 1000, 2000, 3000], intr, 0.001).unwrap();
        assert_eq!(frame.distance_at(0, 0), 0.0);
        assert!((frame.distance_at(1, 1) - 3.0).abs() < 1e-6);
        // Out of bounds reads as missing
        assert_eq!(frame.distance_at(2, 0), 0.0);
    }

    #[test]
    fn test_extrinsics_translation() {
        let mut ext = Extrinsics::identity();
        ext.translation = [0.1, 0.0, 0.0];
        let p = ext.transform([1.0, 2.0, 3.0]);
        assert!((p[0] - 1.1).abs() < 1e-12);
        assert_eq!(p[1], 2.0);
        assert!(!ext.is_identity());
    }
}
