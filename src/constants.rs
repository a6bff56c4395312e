// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Temporal filter persistence modes
///
/// Decide whether a pixel with no valid sample in the current frame is
/// filled in from the last valid value, based on how often it was valid
/// in the recent past.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    /// Never fill holes
    Disabled,
    /// Valid in all of the last 8 frames
    Valid8of8,
    /// Valid in 2 of the last 3 frames
    Valid2of3,
    /// Valid in 2 of the last 4 frames
    #[default]
    Valid2of4,
    /// Valid in 2 of the last 8 frames
    Valid2of8,
    /// Valid in 1 of the last 2 frames
    Valid1of2,
    /// Valid in 1 of the last 5 frames
    Valid1of5,
    /// Valid in 1 of the last 8 frames
    Valid1of8,
    /// Fill whenever any value was ever seen
    AlwaysOn,
}

impl PersistenceMode {
    /// Get display name for the mode
    pub fn display_name(&self) -> &'static str {
        match self {
            PersistenceMode::Disabled => "Disabled",
            PersistenceMode::Valid8of8 => "Valid in 8/8",
            PersistenceMode::Valid2of3 => "Valid in 2/last 3",
            PersistenceMode::Valid2of4 => "Valid in 2/last 4",
            PersistenceMode::Valid2of8 => "Valid in 2/8",
            PersistenceMode::Valid1of2 => "Valid in 1/last 2",
            PersistenceMode::Valid1of5 => "Valid in 1/last 5",
            PersistenceMode::Valid1of8 => "Valid in 1/8",
            PersistenceMode::AlwaysOn => "Always on",
        }
    }

    /// Window size and required valid count, `None` for the unconditional modes
    ///
    /// History bit 0 is the current frame, bit 1 the previous one and so on.
    pub fn window(&self) -> Option<(u32, u32)> {
        match self {
            PersistenceMode::Disabled | PersistenceMode::AlwaysOn => None,
            PersistenceMode::Valid8of8 => Some((8, 8)),
            PersistenceMode::Valid2of3 => Some((3, 2)),
            PersistenceMode::Valid2of4 => Some((4, 2)),
            PersistenceMode::Valid2of8 => Some((8, 2)),
            PersistenceMode::Valid1of2 => Some((2, 1)),
            PersistenceMode::Valid1of5 => Some((5, 1)),
            PersistenceMode::Valid1of8 => Some((8, 1)),
        }
    }

    /// Whether a pixel with the given validity history may be filled
    pub fn accepts(&self, history: u8) -> bool {
        match self {
            PersistenceMode::Disabled => false,
            PersistenceMode::AlwaysOn => true,
            _ => match self.window() {
                Some((window, required)) => {
                    let mask = if window >= 8 { 0xFF } else { (1u16 << window) as u8 - 1 };
                    (history & mask).count_ones() >= required
                }
                None => false,
            },
        }
    }
}

/// Default sensor stream settings
pub mod stream {
    /// Default stream width for both color and depth
    pub const WIDTH: u32 = 1280;

    /// Default stream height for both color and depth
    pub const HEIGHT: u32 = 720;

    /// Default frame rate
    pub const FPS: u32 = 30;

    /// Meters per Z16 unit on common stereo depth cameras
    pub const DEPTH_SCALE: f32 = 0.001;

    /// Stereo baseline used when the sensor does not report one (meters)
    pub const STEREO_BASELINE_M: f32 = 0.05;
}

/// Depth filter defaults
pub mod filters {
    /// Decimation magnitude (1 = pass-through)
    pub const DECIMATION_MAGNITUDE: u32 = 1;

    /// Largest supported decimation magnitude
    pub const MAX_DECIMATION_MAGNITUDE: u32 = 8;

    /// Magnitudes up to this use the median, larger ones the mean
    pub const MEDIAN_MAX_MAGNITUDE: u32 = 3;

    /// Disparity is stored in 1/32 pixel units
    pub const DISPARITY_SUBPIXEL: f32 = 32.0;

    pub const SPATIAL_ALPHA: f32 = 0.5;
    pub const SPATIAL_DELTA: f32 = 20.0;
    pub const SPATIAL_ITERATIONS: u32 = 2;
    pub const MAX_SPATIAL_ITERATIONS: u32 = 5;

    pub const TEMPORAL_ALPHA: f32 = 0.4;
    pub const TEMPORAL_DELTA: f32 = 20.0;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Bounded wait for a frame pair
    pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Connect + write bound for result transport
    pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

    /// Per-connection read bound on the receiving side
    pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Log capture statistics every N frames
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Pacing of the MJPEG stream when no new frame is available
    pub const STREAM_FRAME_INTERVAL: Duration = Duration::from_millis(33);
}

/// Result transport constants
pub mod transport {
    /// Default receiver address for outgoing results
    pub const REMOTE_ADDR: &str = "127.0.0.1:5000";

    /// Default bind address of the result listener
    pub const LISTEN_ADDR: &str = "0.0.0.0:5000";

    /// Largest accepted length-prefixed frame
    pub const MAX_FRAME_LEN: usize = 1024 * 1024;

    /// Read bound for unframed (EOF-delimited) payloads
    pub const RAW_READ_LIMIT: usize = 4096;
}

/// HTTP control surface constants
pub mod server {
    /// Default bind address
    pub const BIND_ADDR: &str = "127.0.0.1:8000";

    /// JPEG quality of preview frames
    pub const PREVIEW_JPEG_QUALITY: u8 = 20;

    /// JPEG quality of saved detection results
    pub const RESULT_JPEG_QUALITY: u8 = 92;

    /// Placeholder frame size served before the first capture
    pub const PLACEHOLDER_WIDTH: u32 = 1280;
    pub const PLACEHOLDER_HEIGHT: u32 = 720;

    /// Multipart boundary of the MJPEG stream
    pub const MJPEG_BOUNDARY: &str = "frame";
}

/// Detection defaults
pub mod detection {
    /// Default confidence threshold
    pub const CONFIDENCE: f64 = 0.5;

    /// Box outline color (RGB)
    pub const BOX_COLOR: [u8; 3] = [0, 255, 0];

    /// Box outline thickness in pixels
    pub const BOX_THICKNESS: u32 = 2;

    /// Saved result filename prefix
    pub const RESULT_PREFIX: &str = "result";
}

/// File format helpers
pub mod file_formats {
    /// Image extensions the image store can write
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

    /// Check if extension is a writable image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Application name used for directories and logging
    pub const NAME: &str = "depth-locator";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_persistence_window() {
        let mode = PersistenceMode::default();
        assert_eq!(mode, PersistenceMode::Valid2of4);
        // Valid now and three frames ago
        assert!(mode.accepts(0b1001));
        // Only once in the last four
        assert!(!mode.accepts(0b0001));
        // Old history outside the window does not count
        assert!(!mode.accepts(0b1111_0000));
    }

    #[test]
    fn test_unconditional_modes() {
        assert!(!PersistenceMode::Disabled.accepts(0xFF));
        assert!(PersistenceMode::AlwaysOn.accepts(0));
        assert!(PersistenceMode::Valid8of8.accepts(0xFF));
        assert!(!PersistenceMode::Valid8of8.accepts(0x7F));
    }
}
